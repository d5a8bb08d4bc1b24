//! Wire timestamp used by the compact schemas

use chrono::{DateTime, Utc};

/// Seconds + nanoseconds since the Unix epoch
#[derive(Clone, PartialEq, prost::Message)]
pub struct WireTimestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

pub fn to_wire(value: &DateTime<Utc>) -> Option<WireTimestamp> {
    // subsec nanos stay below 2e9 even across leap seconds
    Some(WireTimestamp {
        seconds: value.timestamp(),
        nanos: value.timestamp_subsec_nanos() as i32,
    })
}

/// Converts back to a `DateTime`; absent or out-of-range values decode to the
/// Unix epoch instead of failing
pub fn from_wire(value: Option<WireTimestamp>) -> DateTime<Utc> {
    value
        .and_then(|ts| {
            let nanos = u32::try_from(ts.nanos).ok()?;
            DateTime::from_timestamp(ts.seconds, nanos)
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_wire_keeps_nanoseconds() {
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let wire = to_wire(&at).unwrap();

        assert_eq!(wire.seconds, 1_700_000_000);
        assert_eq!(wire.nanos, 123_456_789);
        assert_eq!(from_wire(Some(wire)), at);
    }

    #[test]
    fn test_invalid_wire_value_decodes_to_epoch() {
        let negative_nanos = WireTimestamp {
            seconds: 10,
            nanos: -1,
        };
        assert_eq!(from_wire(Some(negative_nanos)), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(from_wire(None), DateTime::<Utc>::UNIX_EPOCH);
    }
}
