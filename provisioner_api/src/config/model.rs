use std::str::FromStr;

use enumflags2::{bitflags, BitFlags};
use log::debug;
use strum_macros::{EnumString, IntoStaticStr};

/// Per-model hardware exceptions, encoded in the node model string.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ModelOption {
    /// Multiprocessor kernel.
    Smp = 1 << 0,
    /// 64-bit capable CPU.
    X64 = 1 << 1,
    /// Gigabit ethernet.
    Gige = 1 << 2,
    /// Run a destructive bad-block scan when formatting root.
    #[strum(serialize = "badhd")]
    BadHd = 1 << 3,
    /// Known to be below the hardware thresholds, skip the checks.
    #[strum(serialize = "minhw")]
    MinHw = 1 << 4,
    /// Leave every device but the first unmanaged for raw use.
    #[strum(serialize = "rawdisk")]
    RawDisk = 1 << 5,
}

pub type ModelOptions = BitFlags<ModelOption>;

/// Parses the options out of a model string such as `Dell R630/minhw/badhd`.
///
/// Every `/`-separated token is looked at, the make included. Tokens that
/// don't name an option are ignored.
pub fn parse_model_options(model: &str) -> ModelOptions {
    model
        .split('/')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .fold(BitFlags::empty(), |options, token| {
            match ModelOption::from_str(token) {
                Ok(option) => options | option,
                Err(_) => {
                    debug!("Ignoring model token '{token}'");
                    options
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use enumflags2::make_bitflags;

    use super::*;

    #[test]
    fn test_parse_model_options() {
        assert_eq!(parse_model_options(""), BitFlags::empty());
        assert_eq!(parse_model_options("Dell R630"), BitFlags::empty());
        assert_eq!(
            parse_model_options("Dell R630/minhw/BadHD"),
            make_bitflags!(ModelOption::{MinHw | BadHd})
        );
        assert_eq!(
            parse_model_options("whitebox/ smp /x64/gige/unknown//rawdisk"),
            make_bitflags!(ModelOption::{Smp | X64 | Gige | RawDisk})
        );
    }

    #[test]
    fn test_make_token_counts() {
        assert_eq!(
            parse_model_options("rawdisk/generic"),
            BitFlags::from(ModelOption::RawDisk)
        );
    }
}
