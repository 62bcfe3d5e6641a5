//! Record types, one per supported thing type

use super::types::{
    parse_time, required_when, ApproxDateTime, CodableValue, DisplayValue, FromElement,
    LengthValue, Person, StructuredNameValue,
};
use crate::error::Result;
use crate::xml::Element;
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

/// `<basic>`: coarse demographics, no timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BasicDemographics {
    pub gender: Option<String>,
    pub birthyear: Option<i64>,
    pub country_text: Option<String>,
    pub country_code: Option<String>,
    pub postcode: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl FromElement for BasicDemographics {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            gender: elt.text_at("gender"),
            birthyear: elt.int_at("birthyear")?,
            country_text: elt.text_at("country/text"),
            country_code: elt.text_at("country/code/value"),
            postcode: elt.text_at("postcode"),
            city: elt.text_at("city"),
            state: elt.text_at("state/text"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BloodGlucose {
    pub when: NaiveDateTime,
    pub mmol_per_l: Option<f64>,
    pub display: Option<DisplayValue>,
    pub measurement_type: CodableValue,
    pub outside_operating_temp: Option<bool>,
    pub is_control_test: Option<bool>,
    /// 1 (well below normal) to 5 (well above normal)
    pub normalcy: Option<i64>,
    pub measurement_context: Option<CodableValue>,
}

impl FromElement for BloodGlucose {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: required_when(elt)?,
            mmol_per_l: elt.float_at("value/mmolPerL")?,
            display: elt.optional("value/display", DisplayValue::from_element)?,
            measurement_type: CodableValue::from_element(
                elt.required("glucose-measurement-type")?,
            )?,
            outside_operating_temp: elt.bool_at("outside-operating-temp")?,
            is_control_test: elt.bool_at("is-control-test")?,
            normalcy: elt.int_at("normalcy")?,
            measurement_context: elt.optional("measurement-context", CodableValue::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BloodPressure {
    pub when: NaiveDateTime,
    pub systolic: Option<i64>,
    pub diastolic: Option<i64>,
    pub pulse: Option<i64>,
    pub irregular_heartbeat: Option<bool>,
}

impl FromElement for BloodPressure {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: required_when(elt)?,
            systolic: elt.int_at("systolic")?,
            diastolic: elt.int_at("diastolic")?,
            pulse: elt.int_at("pulse")?,
            irregular_heartbeat: elt.bool_at("irregular-heartbeat")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub when: NaiveDateTime,
    pub device_name: Option<String>,
    pub vendor: Option<Person>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub anatomic_site: Option<String>,
    pub description: Option<String>,
}

impl FromElement for Device {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: required_when(elt)?,
            device_name: elt.text_at("device-name"),
            vendor: elt.optional("vendor", Person::from_element)?,
            model: elt.text_at("model"),
            serial_number: elt.text_at("serial-number"),
            anatomic_site: elt.text_at("anatomic-site"),
            description: elt.text_at("description"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseSegment {
    pub activity: CodableValue,
    pub title: Option<String>,
    pub distance: Option<LengthValue>,
    /// Minutes
    pub duration: Option<f64>,
    /// Minutes from the start of the session
    pub offset: Option<f64>,
    pub detail: Vec<StructuredNameValue>,
}

impl FromElement for ExerciseSegment {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            activity: CodableValue::from_element(elt.required("activity")?)?,
            title: elt.text_at("title"),
            distance: elt.optional("distance", LengthValue::from_element)?,
            duration: elt.float_at("duration")?,
            offset: elt.float_at("offset")?,
            detail: elt.all("detail", StructuredNameValue::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exercise {
    pub when: ApproxDateTime,
    pub activity: CodableValue,
    pub title: Option<String>,
    pub distance: Option<LengthValue>,
    /// Minutes
    pub duration: Option<f64>,
    pub detail: Vec<StructuredNameValue>,
    pub segment: Vec<ExerciseSegment>,
}

impl FromElement for Exercise {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: ApproxDateTime::from_element(elt.required("when")?)?,
            activity: CodableValue::from_element(elt.required("activity")?)?,
            title: elt.text_at("title"),
            distance: elt.optional("distance", LengthValue::from_element)?,
            duration: elt.float_at("duration")?,
            detail: elt.all("detail", StructuredNameValue::from_element)?,
            segment: elt.all("segment", ExerciseSegment::from_element)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Height {
    pub when: NaiveDateTime,
    pub value: LengthValue,
}

impl FromElement for Height {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: required_when(elt)?,
            value: LengthValue::from_element(elt.required("value")?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Awakening {
    pub when: NaiveTime,
    pub minutes: Option<i64>,
}

impl FromElement for Awakening {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: parse_time(elt.required("when")?)?,
            minutes: elt.int_at("minutes")?,
        })
    }
}

/// `<sleep-am>`: the morning sleep journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SleepSession {
    pub when: NaiveDateTime,
    pub bed_time: NaiveTime,
    pub wake_time: NaiveTime,
    pub sleep_minutes: Option<i64>,
    pub settling_minutes: Option<i64>,
    pub awakening: Vec<Awakening>,
    pub medications: Vec<CodableValue>,
    pub wake_state: Option<i64>,
}

impl FromElement for SleepSession {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: required_when(elt)?,
            bed_time: parse_time(elt.required("bed-time")?)?,
            wake_time: parse_time(elt.required("wake-time")?)?,
            sleep_minutes: elt.int_at("sleep-minutes")?,
            settling_minutes: elt.int_at("settling-minutes")?,
            awakening: elt.all("awakening", Awakening::from_element)?,
            medications: elt.all("medications", CodableValue::from_element)?,
            wake_state: elt.int_at("wake-state")?,
        })
    }
}

/// Weight in kilograms, plus pounds when the display value is in `lb`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightMeasurement {
    pub when: NaiveDateTime,
    pub kg: Option<f64>,
    pub lbs: Option<f64>,
}

impl FromElement for WeightMeasurement {
    fn from_element(elt: &Element) -> Result<Self> {
        Ok(Self {
            when: required_when(elt)?,
            kg: elt.float_at("value/kg")?,
            lbs: elt.float_at("value/display[@units='lb']")?,
        })
    }
}
