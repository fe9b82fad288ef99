mod dataloader;
mod dataset;
mod mnist;
mod synthetic;
mod table;

pub use dataloader::{Batches, DataLoader, LastBatch};
pub use dataset::{Batch, Dataset, InMemoryDataset, Sample};
pub use mnist::{MnistSplit, load_mnist, read_idx_images, read_idx_labels};
pub use synthetic::blobs;
pub use table::{CsvOptions, load_csv, read_csv};
