pub mod bitpack;
pub mod catalog;
pub mod dataset;
pub mod dims;
pub mod error;
pub mod format;
pub mod mask_store;
pub mod payload;
pub mod reader;
pub mod segmentation;
pub mod writer;

pub use catalog::{
    CatalogEntry, SegmentCatalog, SegmentDescriptor, SegmentId, SegmentRecord, SegmentSequence,
    SegmentSlot, SparseSegmentList,
};
pub use dataset::{
    export_segmentation, import_segmentation, ContainerIo, RawDataset, SegmentationDataset,
    SegmentationImport,
};
pub use dims::{Dims, VolumeLayout};
pub use error::SegError as Error;
pub use error::{Result, SegError};
pub use format::{Segp1Header, HEADER_SIZE, MAGIC};
pub use mask_store::{Mask, ToolState};
pub use payload::{initial_capacity, PayloadCodec};
pub use reader::Reader;
pub use segmentation::{decode, encode, DecodedSegmentation, PackedVolume, SliceDescriptor};
pub use writer::Writer;
