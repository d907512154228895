// ドライブサブシステム: リクエスト定義とシミュレートされたSSD
pub mod request;
pub mod simulator;

pub use request::{
    completion_pair, DriveError, DriveOutput, DriveResult, IoCommand, IoCompleter, IoRequest,
    IoType, IoWaiter,
};
pub use simulator::{Drive, LatencyProfile};
