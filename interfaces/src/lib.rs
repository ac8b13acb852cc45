pub mod block_feed;
pub mod event_feed;
pub mod health_factor_oracle;
pub mod oracle_feed;
pub mod reserve_data_reader;
pub mod telemetry;
pub mod tx_sender;

pub use block_feed::BlockFeed;
pub use event_feed::{DecodedLog, EventFeed};
pub use health_factor_oracle::{HealthFactorOracle, HfQueryError, HfReading};
pub use oracle_feed::{OracleFeed, PriceSignal, PriceSource};
pub use reserve_data_reader::{ReserveDataReader, ReserveMeta};
pub use telemetry::Telemetry;
pub use tx_sender::{SignedTx, TxPlan, TxSender, TxSenderError, UnsignedTx};
