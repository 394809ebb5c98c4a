use serde::{Deserialize, Serialize};

/// Study section a user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "AR")]
    Architecture,
    #[serde(rename = "CGC")]
    Chemistry,
    #[serde(rename = "GC")]
    CivilEngineering,
    #[serde(rename = "IN")]
    ComputerScience,
    #[serde(rename = "SC")]
    CommunicationSystems,
    #[serde(rename = "EL")]
    ElectricalEngineering,
    #[serde(rename = "SIE")]
    EnvironmentalEngineering,
    #[serde(rename = "SV")]
    LifeSciences,
    #[serde(rename = "MX")]
    MaterialsScience,
    #[serde(rename = "MA")]
    Mathematics,
    #[serde(rename = "GM")]
    MechanicalEngineering,
    #[serde(rename = "MT")]
    Microengineering,
    #[serde(rename = "PH")]
    Physics,
}

impl Section {
    pub const ALL: [Section; 13] = [
        Section::Architecture,
        Section::Chemistry,
        Section::CivilEngineering,
        Section::ComputerScience,
        Section::CommunicationSystems,
        Section::ElectricalEngineering,
        Section::EnvironmentalEngineering,
        Section::LifeSciences,
        Section::MaterialsScience,
        Section::Mathematics,
        Section::MechanicalEngineering,
        Section::Microengineering,
        Section::Physics,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Section::Architecture => "AR",
            Section::Chemistry => "CGC",
            Section::CivilEngineering => "GC",
            Section::ComputerScience => "IN",
            Section::CommunicationSystems => "SC",
            Section::ElectricalEngineering => "EL",
            Section::EnvironmentalEngineering => "SIE",
            Section::LifeSciences => "SV",
            Section::MaterialsScience => "MX",
            Section::Mathematics => "MA",
            Section::MechanicalEngineering => "GM",
            Section::Microengineering => "MT",
            Section::Physics => "PH",
        }
    }

    /// Parse a section code, case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code().eq_ignore_ascii_case(code.trim()))
    }
}

/// Semester within a bachelor or master cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Semester {
    BA1,
    BA2,
    BA3,
    BA4,
    BA5,
    BA6,
    MA1,
    MA2,
    MA3,
    MA4,
}

impl Semester {
    pub const ALL: [Semester; 10] = [
        Semester::BA1,
        Semester::BA2,
        Semester::BA3,
        Semester::BA4,
        Semester::BA5,
        Semester::BA6,
        Semester::MA1,
        Semester::MA2,
        Semester::MA3,
        Semester::MA4,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Semester::BA1 => "BA1",
            Semester::BA2 => "BA2",
            Semester::BA3 => "BA3",
            Semester::BA4 => "BA4",
            Semester::BA5 => "BA5",
            Semester::BA6 => "BA6",
            Semester::MA1 => "MA1",
            Semester::MA2 => "MA2",
            Semester::MA3 => "MA3",
            Semester::MA4 => "MA4",
        }
    }

    /// Parse a semester code, case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.code().eq_ignore_ascii_case(code.trim()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub section: Option<Section>,
    #[serde(default)]
    pub semester: Option<Semester>,
    /// Tag ids the user is interested in.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Association ids the user sits on a committee of.
    #[serde(default)]
    pub committees: Vec<String>,
    /// Association ids the user follows.
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            section: None,
            semester: None,
            interests: Vec::new(),
            committees: Vec::new(),
            subscriptions: Vec::new(),
        }
    }
}
