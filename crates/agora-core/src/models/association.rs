use serde::{Deserialize, Serialize};

use super::Tag;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub id: String,
    pub name: String,
    pub description: String,
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Minimal projection of an `Association`, used where full detail is not
/// needed (event organizers, pickers).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationHeader {
    pub id: String,
    pub name: String,
}

impl Association {
    pub fn header(&self) -> AssociationHeader {
        AssociationHeader {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

impl From<&Association> for AssociationHeader {
    fn from(association: &Association) -> Self {
        association.header()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_projection() {
        let association = Association {
            id: "agepoly".to_string(),
            name: "AGEPoly".to_string(),
            description: "Student union".to_string(),
            url: Some("https://agepoly.ch".to_string()),
            tags: vec![Tag::new("sport", "Sport", None)],
        };
        let header = AssociationHeader::from(&association);
        assert_eq!(header.id, "agepoly");
        assert_eq!(header.name, "AGEPoly");
    }
}
