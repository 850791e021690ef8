use std::{fmt::Display, num::ParseIntError, str::FromStr};

/// Size of a logical volume in bytes.
///
/// Accepts a plain byte count or a number with one of the `K`, `M`, `G`, `T`
/// binary suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct VolumeSize(u64);

impl VolumeSize {
    pub const fn from_bytes(bytes: u64) -> Self {
        VolumeSize(bytes)
    }

    pub const fn from_mib(mib: u64) -> Self {
        VolumeSize(mib << 20)
    }

    pub const fn from_gib(gib: u64) -> Self {
        VolumeSize(gib << 30)
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseVolumeSizeError {
    #[error(transparent)]
    InvalidNumber(#[from] ParseIntError),
    #[error("size '{0}' does not fit in 64 bits")]
    Overflow(String),
}

impl FromStr for VolumeSize {
    type Err = ParseVolumeSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        from_human_readable(s).map(VolumeSize)
    }
}

impl From<u64> for VolumeSize {
    fn from(n: u64) -> Self {
        VolumeSize(n)
    }
}

impl Display for VolumeSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", to_human_readable(self.0))
    }
}

fn to_human_readable(x: u64) -> String {
    match x.trailing_zeros() {
        _ if x == 0 => "0".to_owned(),
        0..=9 => format!("{}", x),
        10..=19 => format!("{}K", x >> 10),
        20..=29 => format!("{}M", x >> 20),
        30..=39 => format!("{}G", x >> 30),
        _ => format!("{}T", x >> 40),
    }
}

fn from_human_readable(s: &str) -> Result<u64, ParseVolumeSizeError> {
    let s = s.trim();
    let parse = |val: &str, shift: u32| -> Result<u64, ParseVolumeSizeError> {
        val.trim()
            .parse::<u64>()?
            .checked_mul(1 << shift)
            .ok_or_else(|| ParseVolumeSizeError::Overflow(s.to_owned()))
    };
    match s.char_indices().last() {
        Some((i, 'K' | 'k')) => parse(&s[..i], 10),
        Some((i, 'M' | 'm')) => parse(&s[..i], 20),
        Some((i, 'G' | 'g')) => parse(&s[..i], 30),
        Some((i, 'T' | 't')) => parse(&s[..i], 40),
        _ => parse(s, 0),
    }
}

impl<'de> serde::Deserialize<'de> for VolumeSize {
    fn deserialize<D>(deserializer: D) -> Result<VolumeSize, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // YAML turns a digits-only value into a number, so both shapes are accepted.
        let value = serde_yaml::Value::deserialize(deserializer)?;

        match value {
            serde_yaml::Value::String(s) => VolumeSize::from_str(s.as_str())
                .map_err(|e| serde::de::Error::custom(format!("invalid volume size: {e}"))),
            serde_yaml::Value::Number(n) => n.as_u64().map(VolumeSize).ok_or_else(|| {
                serde::de::Error::custom("invalid volume size, expected unsigned integer")
            }),
            _ => Err(serde::de::Error::custom("invalid volume size")),
        }
    }
}

impl serde::Serialize for VolumeSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}
