//! AddressSource trait - static address list provider

use crate::{ContractError, TagAddress};

/// Provides the ordered list of tag addresses, loaded once at startup
pub trait AddressSource {
    /// Human readable origin (file path, "inline", ...)
    fn describe(&self) -> String;

    /// Load the ordered address list
    ///
    /// # Errors
    /// Any failure, including an empty list, is a configuration error
    fn load_addresses(&self) -> Result<Vec<TagAddress>, ContractError>;
}
