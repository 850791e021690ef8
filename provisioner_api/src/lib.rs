pub mod config;
pub mod constants;
pub mod error;

/// Returns true if the value equals its type's default. Used to skip
/// serializing defaulted fields.
pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}
