pub mod activations;
mod init;
pub mod layers;
pub mod loss;
mod model;
mod sequential;

pub use init::ParamInit;
pub use model::Model;
pub use sequential::Sequential;
