pub mod features;
pub mod manual;
