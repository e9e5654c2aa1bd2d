//! Distinguished name decoding.

use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use der::asn1::Any;
use x509_cert::name::Name;

use crate::error::PkiError;

pub const OID_CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
pub const OID_C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
pub const OID_L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
pub const OID_ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
pub const OID_O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
pub const OID_OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
pub const OID_EMAIL: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

/// The subject attributes the engine reads. Attributes outside this set
/// are ignored; when one occurs more than once the first wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: Option<String>,
    pub organization: Option<String>,
    pub organizational_unit: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub locality: Option<String>,
    pub email: Option<String>,
}

impl DistinguishedName {
    pub fn parse(name: &Name) -> Result<Self, PkiError> {
        let mut dn = DistinguishedName::default();

        for atav in name.0.iter().flat_map(|rdn| rdn.0.iter()) {
            let slot = match atav.oid {
                OID_CN => &mut dn.common_name,
                OID_O => &mut dn.organization,
                OID_OU => &mut dn.organizational_unit,
                OID_C => &mut dn.country,
                OID_ST => &mut dn.state,
                OID_L => &mut dn.locality,
                OID_EMAIL => &mut dn.email,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(decode_string(&atav.value)?);
            }
        }

        Ok(dn)
    }

    /// The subject common name, required for issuance.
    pub fn require_common_name(&self) -> Result<&str, PkiError> {
        self.common_name
            .as_deref()
            .ok_or_else(|| PkiError::MalformedDn("subject has no common name".into()))
    }
}

fn decode_string(value: &Any) -> Result<String, PkiError> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            std::str::from_utf8(value.value())
                .map(str::to_string)
                .map_err(|e| PkiError::MalformedDn(format!("attribute is not valid UTF-8: {e}")))
        }
        other => Err(PkiError::MalformedDn(format!(
            "unsupported attribute encoding {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn reads_known_attributes() {
        let name = Name::from_str("CN=api.example.com,OU=Platform,O=Example,C=CH").unwrap();
        let dn = DistinguishedName::parse(&name).unwrap();

        assert_eq!(dn.common_name.as_deref(), Some("api.example.com"));
        assert_eq!(dn.organizational_unit.as_deref(), Some("Platform"));
        assert_eq!(dn.organization.as_deref(), Some("Example"));
        assert_eq!(dn.country.as_deref(), Some("CH"));
        assert_eq!(dn.require_common_name().unwrap(), "api.example.com");
    }

    #[test]
    fn missing_common_name_is_malformed() {
        let name = Name::from_str("O=Example").unwrap();
        let dn = DistinguishedName::parse(&name).unwrap();
        assert!(matches!(
            dn.require_common_name(),
            Err(PkiError::MalformedDn(_))
        ));
    }
}
