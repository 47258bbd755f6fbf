mod article;
mod category;
mod subscriber;
mod user;

pub use article::*;
pub use category::*;
pub use subscriber::*;
pub use user::*;
