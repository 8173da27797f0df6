//! Reference time used when judging certificate validity periods and revocation evidence

use core::{cmp::Ordering, fmt, time::Duration};
use std::time::SystemTime;

use serde::{
    de::{self, Deserializer, Visitor},
    ser::Serializer,
    Deserialize, Serialize,
};
use x509_ocsp::OcspGeneralizedTime;

/// Time of interest for the validation of a certificate or its revocation status. Serializes as the
/// number of seconds since the Unix epoch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub struct TimeOfInterest(pub der::DateTime);

impl fmt::Display for TimeOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TimeOfInterest {
    /// Creates a [`TimeOfInterest`] for the current system time
    pub fn now() -> Self {
        match der::DateTime::from_system_time(SystemTime::now()) {
            Ok(dt) => Self(dt),
            // only a clock set beyond 9999 lands here
            Err(_) => Self(der::DateTime::INFINITY),
        }
    }

    /// Create a [`TimeOfInterest`] from Unix epoch
    pub fn from_unix_secs(v: u64) -> der::Result<Self> {
        Ok(Self(der::DateTime::from_unix_duration(
            Duration::from_secs(v),
        )?))
    }

    /// Return Unix epoch (in seconds) for this value
    pub fn as_unix_secs(&self) -> u64 {
        self.0.unix_duration().as_secs()
    }

    /// Returns true if `earlier + window` is before this time, i.e., evidence produced at `earlier`
    /// is too old to be relied upon at this time.
    pub fn is_beyond_window(&self, earlier: u64, window: Duration) -> bool {
        earlier.saturating_add(window.as_secs()) < self.as_unix_secs()
    }
}

impl Default for TimeOfInterest {
    fn default() -> Self {
        Self::now()
    }
}

impl PartialEq<x509_cert::time::Time> for TimeOfInterest {
    fn eq(&self, other: &x509_cert::time::Time) -> bool {
        self.0.eq(&other.to_date_time())
    }
}

impl PartialOrd<x509_cert::time::Time> for TimeOfInterest {
    fn partial_cmp(&self, other: &x509_cert::time::Time) -> Option<Ordering> {
        self.0.partial_cmp(&other.to_date_time())
    }
}

impl PartialEq<OcspGeneralizedTime> for TimeOfInterest {
    fn eq(&self, other: &OcspGeneralizedTime) -> bool {
        self.0.eq(&other.0.to_date_time())
    }
}

impl PartialOrd<OcspGeneralizedTime> for TimeOfInterest {
    fn partial_cmp(&self, other: &OcspGeneralizedTime) -> Option<Ordering> {
        self.0.partial_cmp(&other.0.to_date_time())
    }
}

impl Serialize for TimeOfInterest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(self.as_unix_secs())
    }
}

impl<'de> Deserialize<'de> for TimeOfInterest {
    fn deserialize<D>(deserializer: D) -> Result<TimeOfInterest, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ToiVisitor;

        impl<'de> Visitor<'de> for ToiVisitor {
            type Value = TimeOfInterest;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("an integer between 0 and 2^64")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                TimeOfInterest::from_unix_secs(value)
                    .map_err(|_| E::custom(format!("time of interest out of range: {value}")))
            }
        }

        deserializer.deserialize_u64(ToiVisitor)
    }
}

#[test]
fn toi_compare_and_window() {
    use der::asn1::GeneralizedTime;
    use x509_cert::time::Time;

    let toi = TimeOfInterest::from_unix_secs(1_700_000_000).unwrap();
    let earlier = Time::GeneralTime(
        GeneralizedTime::from_unix_duration(Duration::from_secs(1_600_000_000)).unwrap(),
    );
    let later = Time::GeneralTime(
        GeneralizedTime::from_unix_duration(Duration::from_secs(1_800_000_000)).unwrap(),
    );
    assert!(toi > earlier);
    assert!(toi < later);

    assert!(toi.is_beyond_window(1_699_000_000, Duration::from_secs(10)));
    assert!(!toi.is_beyond_window(1_699_999_995, Duration::from_secs(10)));
    assert_eq!(1_700_000_000, toi.as_unix_secs());
}

#[test]
fn toi_serde() {
    let toi = TimeOfInterest::from_unix_secs(1_700_000_000).unwrap();
    let s = serde_json::to_string(&toi).unwrap();
    assert_eq!("1700000000", s);
    let back: TimeOfInterest = serde_json::from_str(&s).unwrap();
    assert_eq!(toi, back);
}
