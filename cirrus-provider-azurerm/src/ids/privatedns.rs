use std::fmt;

use super::{IdParseError, ResourceIdType, resource_id};

resource_id! {
    /// Private DNS zone
    PrivateDnsZoneId, "Private DNS Zone" {
        "subscriptions" => subscription_id: "Subscription",
        "resourceGroups" => resource_group_name: "Resource Group Name",
        "providers/Microsoft.Network/privateDnsZones" => private_dns_zone_name: "Private DNS Zone Name",
    }
}

/// Record type segment of a record-set ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Ptr,
    Soa,
    Srv,
    Txt,
}

impl RecordType {
    const ALL: [RecordType; 8] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Ptr,
        RecordType::Soa,
        RecordType::Srv,
        RecordType::Txt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ptr => "PTR",
            RecordType::Soa => "SOA",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
        }
    }

    fn parse(value: &str, insensitive: bool) -> Option<Self> {
        Self::ALL.into_iter().find(|t| {
            if insensitive {
                t.as_str().eq_ignore_ascii_case(value)
            } else {
                t.as_str() == value
            }
        })
    }
}

/// Record set of a private DNS zone
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordSetId {
    pub subscription_id: String,
    pub resource_group_name: String,
    pub private_dns_zone_name: String,
    pub record_type: RecordType,
    pub relative_record_set_name: String,
}

impl RecordSetId {
    pub fn new(
        zone: &PrivateDnsZoneId,
        record_type: RecordType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: zone.subscription_id.clone(),
            resource_group_name: zone.resource_group_name.clone(),
            private_dns_zone_name: zone.private_dns_zone_name.clone(),
            record_type,
            relative_record_set_name: name.into(),
        }
    }

    pub fn id(&self) -> String {
        format!(
            "{}/{}/{}",
            self.zone_id().id(),
            self.record_type.as_str(),
            self.relative_record_set_name
        )
    }

    pub fn zone_id(&self) -> PrivateDnsZoneId {
        PrivateDnsZoneId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.private_dns_zone_name,
        )
    }

    pub fn parse(input: &str) -> Result<Self, IdParseError> {
        Self::parse_with(input, false)
    }

    pub fn parse_insensitively(input: &str) -> Result<Self, IdParseError> {
        Self::parse_with(input, true)
    }

    fn parse_with(input: &str, insensitive: bool) -> Result<Self, IdParseError> {
        if input.is_empty() {
            return Err(IdParseError::Empty { kind: <Self as ResourceIdType>::KIND });
        }
        let invalid = |message: &str| IdParseError::Invalid {
            kind: <Self as ResourceIdType>::KIND,
            input: input.to_string(),
            message: message.to_string(),
        };

        let mut parts = input.rsplitn(3, '/');
        let name = parts.next().unwrap_or_default();
        let record_type = parts.next().unwrap_or_default();
        let zone = parts.next().ok_or_else(|| invalid("missing the record type segment"))?;

        let zone = if insensitive {
            PrivateDnsZoneId::parse_insensitively(zone)
        } else {
            PrivateDnsZoneId::parse(zone)
        }?;
        let record_type = RecordType::parse(record_type, insensitive)
            .ok_or_else(|| invalid(&format!("unsupported record type {:?}", record_type)))?;
        if name.is_empty() {
            return Err(IdParseError::MissingValue {
                kind: <Self as ResourceIdType>::KIND,
                input: input.to_string(),
                field: "relative_record_set_name",
            });
        }

        Ok(Self::new(&zone, record_type, name))
    }

    pub fn validate(input: &str) -> Result<(), String> {
        Self::parse(input).map(|_| ()).map_err(|e| e.to_string())
    }
}

impl ResourceIdType for RecordSetId {
    const KIND: &'static str = "Record Set";

    fn parse(input: &str) -> Result<Self, IdParseError> {
        RecordSetId::parse(input)
    }

    fn parse_insensitively(input: &str) -> Result<Self, IdParseError> {
        RecordSetId::parse_insensitively(input)
    }

    fn id(&self) -> String {
        RecordSetId::id(self)
    }
}

impl fmt::Display for RecordSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record Set (Subscription: {:?} / Resource Group Name: {:?} / Private DNS Zone Name: {:?} / Record Type: {:?} / Relative Record Set Name: {:?})",
            self.subscription_id,
            self.resource_group_name,
            self.private_dns_zone_name,
            self.record_type.as_str(),
            self.relative_record_set_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZONE: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/privateDnsZones/contoso.internal";

    #[test]
    fn parses_record_set() {
        let id = RecordSetId::parse(&format!("{}/A/www", ZONE)).unwrap();
        assert_eq!(id.record_type, RecordType::A);
        assert_eq!(id.relative_record_set_name, "www");
        assert_eq!(id.zone_id().private_dns_zone_name, "contoso.internal");
        assert_eq!(id.id(), format!("{}/A/www", ZONE));
    }

    #[test]
    fn rejects_bad_record_sets() {
        assert!(RecordSetId::parse("").is_err());
        assert!(RecordSetId::parse(&format!("{}/A/", ZONE)).is_err());
        assert!(RecordSetId::parse(&format!("{}/a/www", ZONE)).is_err());
        assert!(RecordSetId::parse(&format!("{}/NS/www", ZONE)).is_err());
        assert!(RecordSetId::parse_insensitively(&format!("{}/a/www", ZONE)).is_ok());
    }
}
