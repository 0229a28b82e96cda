use serde::{Deserialize, Serialize};
use std::str::FromStr;

const MAX_IDENTIFIER_LEN: usize = 128;

fn is_identifier_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')
}

/// Checks a tenant or collection name before it reaches SQL parameters or log lines.
pub fn validate_identifier_value(kind: &str, value: &str) -> Result<(), String> {
    match value.len() {
        0 => Err(format!("{kind} is empty")),
        len if len > MAX_IDENTIFIER_LEN => Err(format!(
            "{kind} is {len} bytes long, limit is {MAX_IDENTIFIER_LEN}"
        )),
        _ => match value.chars().find(|ch| !is_identifier_char(*ch)) {
            None => Ok(()),
            Some(bad) => Err(format!(
                "{kind} contains {bad:?}; allowed are ASCII alphanumerics and '-', '_', '.'"
            )),
        },
    }
}

macro_rules! scoped_name {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(raw: &str) -> Result<Self, String> {
                raw.parse()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                validate_identifier_value($kind, raw).map(|()| Self(raw.to_owned()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                validate_identifier_value($kind, &raw)?;
                Ok(Self(raw))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

scoped_name!(
    /// Partition key for every vector-store row.
    TenantId => "tenant id"
);
scoped_name!(CollectionName => "collection name");

/// Random 128-bit identifier rendered in the canonical 8-4-4-4-12 hex layout.
pub fn generate_document_id() -> Result<String, String> {
    let mut bytes = [0_u8; 16];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| format!("document id entropy unavailable: {err}"))?;
    // version 4, RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let mut out = String::with_capacity(36);
    for (index, byte) in bytes.iter().enumerate() {
        if matches!(index, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_reject_empty_long_and_unsafe_values() {
        assert!(TenantId::parse("acme-prod_1.eu").is_ok());
        assert!(TenantId::parse("").unwrap_err().contains("empty"));
        assert!(CollectionName::parse(&"x".repeat(129)).is_err());
        let err = CollectionName::parse("docs;drop").unwrap_err();
        assert!(err.contains("';'"), "{err}");
    }

    #[test]
    fn identifiers_deserialize_through_validation() {
        let ok: TenantId = serde_json::from_str("\"tenant-a\"").expect("valid");
        assert_eq!(ok.as_str(), "tenant-a");
        assert!(serde_json::from_str::<TenantId>("\"a b\"").is_err());
        assert_eq!(serde_json::to_string(&ok).expect("serialize"), "\"tenant-a\"");
    }

    #[test]
    fn document_ids_are_version_four_uuids() {
        let id = generate_document_id().expect("id");
        assert_eq!(id.len(), 36);
        let groups: Vec<&str> = id.split('-').collect();
        assert_eq!(
            groups.iter().map(|g| g.len()).collect::<Vec<_>>(),
            vec![8, 4, 4, 4, 12]
        );
        assert!(groups[2].starts_with('4'));
        assert!(matches!(groups[3].chars().next(), Some('8' | '9' | 'a' | 'b')));
    }
}
