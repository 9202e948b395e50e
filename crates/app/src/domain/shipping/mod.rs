//! Shipping
//!
//! Carrier quotes for the parcels in a cart. Quotes are advisory: carrier trouble degrades to an
//! empty list with a warning instead of failing the caller.

pub mod carrier;
pub mod melhor_envio;
pub mod quoter;

pub use carrier::{CarrierClient, CarrierError};
pub use melhor_envio::MelhorEnvioClient;
pub use quoter::{CarrierQuoter, ShippingQuoter};
