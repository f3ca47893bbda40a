mod engine;

pub use engine::{InterviewEngine, InterviewSetup};

/// Setup options offered by the setup screen.
pub const ROLES: [&str; 4] = [
    "Software Engineer",
    "Product Manager",
    "Data Analyst",
    "UX Designer",
];

pub const MODES: [&str; 2] = ["Technical", "Behavioral"];

pub const DOMAINS: [&str; 4] = ["Frontend", "Backend", "Machine Learning", "System Design"];

pub const STYLES: [&str; 3] = ["FAANG-style", "STAR-based", "Situational"];
