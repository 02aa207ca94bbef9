pub mod aid;
pub mod alert;
pub mod coordinate;
pub mod enums;
pub mod history;
pub mod search;
pub mod vitals;

pub use aid::*;
pub use alert::*;
pub use coordinate::*;
pub use enums::*;
pub use history::*;
pub use search::*;
pub use vitals::*;
