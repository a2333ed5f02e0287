pub mod cell_mask;
pub mod raster;
pub mod region_props;
pub mod relations;
pub mod segmentation;
pub mod summary;
pub mod table;
