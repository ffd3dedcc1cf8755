pub use kernel::id::{AccountId, markers::Account as AccountMarker};
