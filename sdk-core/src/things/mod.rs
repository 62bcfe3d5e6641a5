//! Typed thing queries and response parsing
//!
//! A `GetThings` request carries one `<group>` per [`ThingQuery`]. Each
//! returned `<thing>` is checked against the type it was requested as and
//! its `<data-xml>` payload is handed to that type's parser.

pub mod records;
pub mod types;

pub use records::{
    Awakening, BasicDemographics, BloodGlucose, BloodPressure, Device, Exercise, ExerciseSegment,
    Height, SleepSession, WeightMeasurement,
};
pub use types::FromElement;

use crate::error::{HealthVaultError, Result};
use crate::xml::{escape, Element};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const GET_THINGS_METHOD: &str = "GetThings";
pub const GET_THINGS_VERSION: u32 = 1;

/// `eff-date-min`/`eff-date-max` format
const FILTER_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Supported thing types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    BasicDemographics,
    BloodGlucose,
    BloodPressure,
    Device,
    Exercise,
    Height,
    SleepSession,
    Weight,
}

/// Parses a `<data-xml>` payload root into a [`Thing`]
pub type ThingParser = fn(&Element) -> Result<Thing>;

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::BasicDemographics,
        DataType::BloodGlucose,
        DataType::BloodPressure,
        DataType::Device,
        DataType::Exercise,
        DataType::Height,
        DataType::SleepSession,
        DataType::Weight,
    ];

    /// Platform type identifier
    pub fn type_id(self) -> Uuid {
        let id: u128 = match self {
            DataType::BasicDemographics => 0x3b3e6b16_eb69_483c_8d7e_dfe116ae6092,
            DataType::BloodGlucose => 0x879e7c04_4e8a_4707_9ad3_b054df467ce4,
            DataType::BloodPressure => 0xca3c57f4_f4c1_4e15_be67_0a3caf5414ed,
            DataType::Device => 0xef9cf8d5_6c0b_4292_997f_4047240bc7be,
            DataType::Exercise => 0x85a21ddb_db20_4c65_8d30_33c899ccf612,
            DataType::Height => 0x40750a6a_89b2_455c_bd8d_b420a4cb500b,
            DataType::SleepSession => 0x11c52484_7f1a_11db_aeac_87d355d89593,
            DataType::Weight => 0x3d34d87e_7fc1_4153_800f_f56592cb0d17,
        };
        Uuid::from_u128(id)
    }

    pub fn from_type_id(id: &Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_id() == *id)
    }

    /// Root element inside `<data-xml>`
    pub fn root_element(self) -> &'static str {
        match self {
            DataType::BasicDemographics => "basic",
            DataType::BloodGlucose => "blood-glucose",
            DataType::BloodPressure => "blood-pressure",
            DataType::Device => "device",
            DataType::Exercise => "exercise",
            DataType::Height => "height",
            DataType::SleepSession => "sleep-am",
            DataType::Weight => "weight",
        }
    }

    pub fn parser(self) -> ThingParser {
        match self {
            DataType::BasicDemographics => parse_as::<BasicDemographics>,
            DataType::BloodGlucose => parse_as::<BloodGlucose>,
            DataType::BloodPressure => parse_as::<BloodPressure>,
            DataType::Device => parse_as::<Device>,
            DataType::Exercise => parse_as::<Exercise>,
            DataType::Height => parse_as::<Height>,
            DataType::SleepSession => parse_as::<SleepSession>,
            DataType::Weight => parse_as::<WeightMeasurement>,
        }
    }

    /// Command-line name
    pub fn name(self) -> &'static str {
        match self {
            DataType::BasicDemographics => "basic-demographics",
            DataType::BloodGlucose => "blood-glucose",
            DataType::BloodPressure => "blood-pressure",
            DataType::Device => "device",
            DataType::Exercise => "exercise",
            DataType::Height => "height",
            DataType::SleepSession => "sleep-session",
            DataType::Weight => "weight",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = HealthVaultError;

    /// Accepts the command-line name or the type identifier
    fn from_str(s: &str) -> Result<Self> {
        if let Some(found) = Self::ALL.into_iter().find(|t| t.name() == s) {
            return Ok(found);
        }
        Uuid::parse_str(s)
            .ok()
            .and_then(|id| Self::from_type_id(&id))
            .ok_or_else(|| HealthVaultError::Config(format!("unknown data type {s:?}")))
    }
}

/// Parsed payload of one thing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Thing {
    BasicDemographics(BasicDemographics),
    BloodGlucose(BloodGlucose),
    BloodPressure(BloodPressure),
    Device(Device),
    Exercise(Exercise),
    Height(Height),
    SleepSession(SleepSession),
    Weight(WeightMeasurement),
}

impl Thing {
    pub fn data_type(&self) -> DataType {
        match self {
            Thing::BasicDemographics(_) => DataType::BasicDemographics,
            Thing::BloodGlucose(_) => DataType::BloodGlucose,
            Thing::BloodPressure(_) => DataType::BloodPressure,
            Thing::Device(_) => DataType::Device,
            Thing::Exercise(_) => DataType::Exercise,
            Thing::Height(_) => DataType::Height,
            Thing::SleepSession(_) => DataType::SleepSession,
            Thing::Weight(_) => DataType::Weight,
        }
    }
}

/// A record type that can be pulled out of a [`Thing`]
pub trait ThingData: FromElement {
    const DATA_TYPE: DataType;

    fn from_thing(thing: Thing) -> Option<Self>;

    fn into_thing(self) -> Thing;
}

fn parse_as<T: ThingData>(elt: &Element) -> Result<Thing> {
    T::from_element(elt).map(T::into_thing)
}

macro_rules! thing_data {
    ($($record:ty => $variant:ident,)*) => {
        $(impl ThingData for $record {
            const DATA_TYPE: DataType = DataType::$variant;

            fn from_thing(thing: Thing) -> Option<Self> {
                match thing {
                    Thing::$variant(record) => Some(record),
                    _ => None,
                }
            }

            fn into_thing(self) -> Thing {
                Thing::$variant(self)
            }
        })*
    };
}

thing_data! {
    BasicDemographics => BasicDemographics,
    BloodGlucose => BloodGlucose,
    BloodPressure => BloodPressure,
    Device => Device,
    Exercise => Exercise,
    Height => Height,
    SleepSession => SleepSession,
    WeightMeasurement => Weight,
}

/// One `<thing>` from a response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThingRecord {
    pub thing_id: String,
    pub version_stamp: Option<String>,
    pub effective_date: Option<NaiveDateTime>,
    pub data: Thing,
}

/// Filter for one group of a `GetThings` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThingQuery {
    pub data_type: DataType,
    pub min_date: Option<NaiveDateTime>,
    pub max_date: Option<NaiveDateTime>,
    pub max_results: Option<u32>,
    /// Extra XML appended inside `<filter>`, sent verbatim
    pub extra_filter: Option<String>,
}

impl ThingQuery {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            min_date: None,
            max_date: None,
            max_results: None,
            extra_filter: None,
        }
    }

    pub fn min_date(mut self, date: NaiveDateTime) -> Self {
        self.min_date = Some(date);
        self
    }

    pub fn max_date(mut self, date: NaiveDateTime) -> Self {
        self.max_date = Some(date);
        self
    }

    pub fn max_results(mut self, max: u32) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn extra_filter(mut self, xml: impl Into<String>) -> Self {
        self.extra_filter = Some(xml.into());
        self
    }

    /// `<group>` element for this query
    pub fn group_xml(&self, name: &str) -> String {
        let mut group = format!("<group name=\"{}\"", escape(name));
        if let Some(max) = self.max_results {
            group.push_str(&format!(" max=\"{max}\""));
        }
        group.push_str("><filter>");
        group.push_str(&format!("<type-id>{}</type-id>", self.data_type.type_id()));
        if let Some(min) = self.min_date {
            group.push_str(&format!(
                "<eff-date-min>{}</eff-date-min>",
                min.format(FILTER_DATE_FORMAT)
            ));
        }
        if let Some(max) = self.max_date {
            group.push_str(&format!(
                "<eff-date-max>{}</eff-date-max>",
                max.format(FILTER_DATE_FORMAT)
            ));
        }
        if let Some(extra) = &self.extra_filter {
            group.push_str(extra);
        }
        group.push_str("</filter><format><section>core</section><xml/></format></group>");
        group
    }
}

/// Name given to the group at `index`
pub fn group_name(index: usize) -> String {
    format!("g{index}")
}

/// `<info>` payload for a `GetThings` call
pub fn get_things_info(queries: &[ThingQuery]) -> String {
    let groups: String = queries
        .iter()
        .enumerate()
        .map(|(i, q)| q.group_xml(&group_name(i)))
        .collect();
    format!("<info>{groups}</info>")
}

/// Parse one `<thing>`, which must be of type `expected`
pub fn parse_thing(thing: &Element, expected: DataType) -> Result<ThingRecord> {
    let type_text = thing
        .text_at("type-id")
        .ok_or_else(|| HealthVaultError::protocol(GET_THINGS_METHOD, "thing without <type-id>"))?;
    let type_id = Uuid::parse_str(&type_text)
        .map_err(|e| HealthVaultError::parse("type-id", format!("{type_text:?}: {e}")))?;
    let data_type = DataType::from_type_id(&type_id).ok_or_else(|| {
        HealthVaultError::protocol(GET_THINGS_METHOD, format!("unrecognized type id {type_id}"))
    })?;
    if data_type != expected {
        return Err(HealthVaultError::protocol(
            GET_THINGS_METHOD,
            format!("expected {expected} things, got {data_type}"),
        ));
    }

    let thing_id = thing.required("thing-id")?;
    let effective_date = thing.optional("eff-date", |e| {
        let text: String = e.parse_text()?;
        NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|err| HealthVaultError::parse("eff-date", format!("{text:?}: {err}")))
    })?;
    let payload = thing.required(&format!("data-xml/{}", data_type.root_element()))?;

    Ok(ThingRecord {
        thing_id: thing_id.parse_text()?,
        version_stamp: thing_id.attr("version-stamp").map(str::to_string),
        effective_date,
        data: data_type.parser()(payload)?,
    })
}

/// Parse every `<thing>` of a group
pub fn parse_group(group: &Element, expected: DataType) -> Result<Vec<ThingRecord>> {
    group.all("thing", |t| parse_thing(t, expected))
}

/// Match response groups to `queries` and parse them.
///
/// Groups are matched by their `name` attribute; a response without names
/// is matched by position. The result has one entry per query, in query
/// order.
pub fn parse_things_response(
    info: &Element,
    queries: &[ThingQuery],
) -> Result<Vec<Vec<ThingRecord>>> {
    let groups = info.find_all("group");
    let named = groups.iter().any(|g| g.attr("name").is_some());

    queries
        .iter()
        .enumerate()
        .map(|(i, query)| {
            let name = group_name(i);
            let group = if named {
                groups.iter().find(|g| g.attr("name") == Some(name.as_str()))
            } else {
                groups.get(i)
            };
            match group {
                Some(group) => parse_group(group, query.data_type),
                None => Err(HealthVaultError::protocol(
                    GET_THINGS_METHOD,
                    format!("no result group for {} ({name})", query.data_type),
                )),
            }
        })
        .collect()
}
