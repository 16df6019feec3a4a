mod duration;
mod target;

pub use self::{
    duration::{parse_humantime_str, parse_tick_interval},
    target::{ApiKey, BaseUrl, TargetConfig},
};
