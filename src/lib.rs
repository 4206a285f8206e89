pub mod a_funcs;
pub mod error;
pub mod helpers;
pub mod initializer;
pub mod layers;
pub mod linalg;
pub mod loss;
pub mod network;
pub mod optimizer;
pub mod shape;
pub mod storage;
pub mod tensor;
pub mod trainer;

pub use error::{Error, Result};
pub use network::Network;
pub use shape::Shape;
pub use tensor::{Tensor, TensorView};
