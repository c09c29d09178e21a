pub mod queue;
pub mod protocol;
pub mod nav;
pub mod transport;
pub mod driver;
pub mod mission_log;

pub use queue::MailQueue;
pub use protocol::{Message, NavUpdate, ProtocolError};
pub use nav::{Datum, StateTracker, UtmCoord, VehicleState};
pub use transport::{BackseatClient, FrontseatServer, TransportError};

pub use driver::{
    Autonomy, BackseatDriver, Detector,
    DriverState, NullAutonomy,
};

pub use mission_log::{MissionLog, FileMissionLog, NullMissionLog};
