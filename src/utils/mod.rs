//! Configuration and site data

pub mod config;

pub use config::{
    AnchorSite, MapMetadata, NavigationConfig, PointOfInterest, SiteConfig, ValidationResult,
};
