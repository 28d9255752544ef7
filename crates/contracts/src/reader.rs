//! TagReader trait - controller read abstraction
//!
//! One reader is one controller connection, owned exclusively by one worker
//! for the process lifetime. Simulated and real drivers share this interface.

use crate::{ContractError, TagAddress, TagRead};

/// Batched controller read
///
/// # Example
///
/// ```ignore
/// let reads = reader.read_batch(&batch).await?;
/// for read in reads {
///     match read.outcome {
///         Ok(value) => println!("{} = {}", read.address, value),
///         Err(failure) => println!("{failure}"),
///     }
/// }
/// ```
#[trait_variant::make(TagReader: Send)]
pub trait LocalTagReader {
    /// Connection name (used for logging/metrics)
    fn connection_id(&self) -> &str;

    /// Read a batch of addresses in one request
    ///
    /// Returns one `TagRead` per requested address, in request order.
    /// A per-address failure is reported inside its `TagRead`.
    ///
    /// # Errors
    /// Connection-level failure: nothing in the batch could be read
    async fn read_batch(&mut self, addresses: &[TagAddress])
        -> Result<Vec<TagRead>, ContractError>;

    /// Release the connection
    async fn close(&mut self) -> Result<(), ContractError>;
}
