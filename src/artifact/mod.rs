//! Document formats the pipeline reads and writes: page HTML, specification
//! markdown and the CSV test case table.

pub mod html;
pub mod markdown;
pub mod table;
