//! Run inputs: the sample manifest and the region set.

mod manifest;
mod regions;

pub use manifest::{parse_manifest, read_manifest, SampleRecord};
pub use regions::{combine_regions, parse_region_list, read_region_file};
