//! Shared value shapes reused across thing types

use crate::error::{HealthVaultError, Result};
use crate::xml::Element;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Build a value from the element that carries it
pub trait FromElement: Sized {
    fn from_element(elt: &Element) -> Result<Self>;
}

fn component(elt: &Element, path: &str) -> Result<u32> {
    let value = elt.int_at(path)?.unwrap_or(0);
    u32::try_from(value).map_err(|_| HealthVaultError::parse(path, format!("{value} is negative")))
}

fn year(elt: &Element, path: &str) -> Result<i32> {
    let value = elt.int_at(path)?.unwrap_or(0);
    i32::try_from(value).map_err(|_| HealthVaultError::parse(path, format!("{value} out of range")))
}

/// `<when><date><y/><m/><d/></date><time><h/><m/><s/></time></when>`; absent parts count as zero
pub fn when_to_datetime(when: &Element) -> Result<NaiveDateTime> {
    let date = NaiveDate::from_ymd_opt(
        year(when, "date/y")?,
        component(when, "date/m")?,
        component(when, "date/d")?,
    )
    .ok_or_else(|| HealthVaultError::parse(when.name(), "invalid calendar date"))?;
    let time = NaiveTime::from_hms_opt(
        component(when, "time/h")?,
        component(when, "time/m")?,
        component(when, "time/s")?,
    )
    .ok_or_else(|| HealthVaultError::parse(when.name(), "invalid time of day"))?;
    Ok(date.and_time(time))
}

/// `approx-date`: `<y/><m/><d/>` with the same zero default
pub fn parse_approx_date(elt: &Element) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year(elt, "y")?, component(elt, "m")?, component(elt, "d")?)
        .ok_or_else(|| HealthVaultError::parse(elt.name(), "invalid calendar date"))
}

/// `time`: hours and minutes required, seconds and milliseconds optional
pub fn parse_time(elt: &Element) -> Result<NaiveTime> {
    let hour = elt.required("h")?.parse_text::<u32>()?;
    let minute = elt.required("m")?.parse_text::<u32>()?;
    let second = elt.optional("s", Element::parse_text::<u32>)?.unwrap_or(0);
    let millis = elt.optional("f", Element::parse_text::<u32>)?.unwrap_or(0);
    NaiveTime::from_hms_milli_opt(hour, minute, second, millis)
        .ok_or_else(|| HealthVaultError::parse(elt.name(), "invalid time of day"))
}

/// `<when>` child decoded with [`when_to_datetime`]
pub(crate) fn required_when(elt: &Element) -> Result<NaiveDateTime> {
    when_to_datetime(elt.required("when")?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodedValue {
    pub value: Option<String>,
    pub family: Vec<String>,
    #[serde(rename = "type")]
    pub code_type: Option<String>,
    pub version: Vec<String>,
}

impl FromElement for CodedValue {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            value: elt.text_at("value"),
            family: elt.texts_at("family"),
            code_type: elt.text_at("type"),
            version: elt.texts_at("version"),
        })
    }
}

/// Free text plus any number of coded alternatives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodableValue {
    pub text: Option<String>,
    pub code: Vec<CodedValue>,
}

impl FromElement for CodableValue {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            text: elt.text_at("text"),
            code: elt.all("code", CodedValue::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Name {
    pub full: String,
    pub title: Option<CodableValue>,
    pub first: Option<String>,
    pub middle: Option<String>,
    pub last: Option<String>,
    pub suffix: Option<CodableValue>,
}

impl FromElement for Name {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            full: elt.required("full")?.parse_text()?,
            title: elt.optional("title", CodableValue::from_element)?,
            first: elt.text_at("first"),
            middle: elt.text_at("middle"),
            last: elt.text_at("last"),
            suffix: elt.optional("suffix", CodableValue::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub description: Option<String>,
    pub is_primary: Option<bool>,
    pub street: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

impl FromElement for Address {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            description: elt.text_at("description"),
            is_primary: elt.bool_at("is-primary")?,
            street: elt.texts_at("street"),
            city: elt.text_at("city"),
            state: elt.text_at("state"),
            postcode: elt.text_at("postcode"),
            country: elt.text_at("country"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phone {
    pub description: Option<String>,
    pub is_primary: Option<bool>,
    pub number: Vec<String>,
}

impl FromElement for Phone {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            description: elt.text_at("description"),
            is_primary: elt.bool_at("is-primary")?,
            number: elt.texts_at("number"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub description: Option<String>,
    pub is_primary: Option<bool>,
    pub address: String,
}

impl FromElement for Email {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            description: elt.text_at("description"),
            is_primary: elt.bool_at("is-primary")?,
            address: elt.required("address")?.parse_text()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub address: Vec<Address>,
    pub phone: Vec<Phone>,
    pub email: Vec<Email>,
}

impl FromElement for Contact {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            address: elt.all("address", Address::from_element)?,
            phone: elt.all("phone", Phone::from_element)?,
            email: elt.all("email", Email::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub name: Option<Name>,
    pub organization: Option<String>,
    pub professional_training: Option<String>,
    pub id: Option<String>,
    pub contact: Option<Contact>,
    #[serde(rename = "type")]
    pub person_type: Option<CodableValue>,
}

impl FromElement for Person {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            name: elt.optional("name", Name::from_element)?,
            organization: elt.text_at("organization"),
            professional_training: elt.text_at("professional-training"),
            id: elt.text_at("id"),
            contact: elt.optional("contact", Contact::from_element)?,
            person_type: elt.optional("type", CodableValue::from_element)?,
        })
    }
}

/// `<display text=".." units=".." units-code="..">value</display>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayValue {
    pub text: Option<String>,
    pub units: Option<String>,
    pub units_code: Option<String>,
    pub display: Option<String>,
}

impl FromElement for DisplayValue {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            text: elt.attr("text").map(str::to_string),
            units: elt.attr("units").map(str::to_string),
            units_code: elt.attr("units-code").map(str::to_string),
            display: elt.text().map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthValue {
    /// Meters
    pub m: f64,
    pub display: Option<DisplayValue>,
}

impl FromElement for LengthValue {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            m: elt.required("m")?.parse_text()?,
            display: elt.optional("display", DisplayValue::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredMeasurement {
    pub value: Option<f64>,
    pub units: Option<CodableValue>,
}

impl FromElement for StructuredMeasurement {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            value: elt.float_at("value")?,
            units: elt.optional("units", CodableValue::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredNameValue {
    pub name: CodedValue,
    pub value: StructuredMeasurement,
}

impl FromElement for StructuredNameValue {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            name: CodedValue::from_element(elt.required("name")?)?,
            value: StructuredMeasurement::from_element(elt.required("value")?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredApproxDate {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub tz: Option<CodableValue>,
}

impl FromElement for StructuredApproxDate {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            date: parse_approx_date(elt.required("date")?)?,
            time: elt.optional("time", parse_time)?,
            tz: elt.optional("tz", CodableValue::from_element)?,
        })
    }
}

/// Either a structured date or a free-text description of one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApproxDateTime {
    pub structured: Option<StructuredApproxDate>,
    pub descriptive: Option<String>,
}

impl FromElement for ApproxDateTime {
    fn from_element(elt: &Element) -> Result<Self> {
        let value = Self {
            structured: elt.optional("structured", StructuredApproxDate::from_element)?,
            descriptive: elt.text_at("descriptive"),
        };
        if value.structured.is_none() && value.descriptive.is_none() {
            return Err(HealthVaultError::parse(
                elt.name(),
                "neither structured nor descriptive date",
            ));
        }
        Ok(value)
    }
}
