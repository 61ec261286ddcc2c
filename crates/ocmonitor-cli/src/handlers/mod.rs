pub mod doctor;
pub mod live;
pub mod models;
pub mod projects;
pub mod sessions;
pub mod usage;
