use crate::state::CrawlSnapshot;
use rocksdb::{BlockBasedOptions, ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const CF_SEEN: &str = "seen";
const CF_WORD_COUNTS: &str = "word_counts";
const CF_FREQUENCIES: &str = "frequencies";
const CF_SUBDOMAINS: &str = "subdomains";
const CF_FRONTIER: &str = "frontier";

const COLUMN_FAMILIES: [&str; 5] = [CF_SEEN, CF_WORD_COUNTS, CF_FREQUENCIES, CF_SUBDOMAINS, CF_FRONTIER];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] rocksdb::Error),

    #[error("column family {0} is missing")]
    MissingColumnFamily(&'static str),

    #[error("corrupt entry in {cf}: {key}")]
    Corrupt { cf: &'static str, key: String },
}

/// Crawl state persisted in RocksDB, one column family per table:
/// - "seen": url -> eligibility byte
/// - "word_counts", "frequencies", "subdomains": key -> little-endian u64
/// - "frontier": big-endian sequence number -> url still waiting to be crawled
#[derive(Clone)]
pub struct Store {
    db: Arc<DB>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(16 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.increase_parallelism(num_cpus::get() as i32);

        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(64 * 1024 * 1024));
        opts.set_block_based_table_factory(&block_opts);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, opts.clone()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or(StoreError::MissingColumnFamily(name))
    }

    /// Replaces everything on disk with `snapshot` and `pending` in a single
    /// atomic batch. If the write fails the previous contents stay intact.
    pub fn save(&self, snapshot: &CrawlSnapshot, pending: &[String]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        for name in COLUMN_FAMILIES {
            let cf = self.cf(name)?;
            for item in self.db.iterator_cf(cf, IteratorMode::Start) {
                let (key, _) = item?;
                batch.delete_cf(cf, key);
            }
        }

        let seen_cf = self.cf(CF_SEEN)?;
        for (url, eligible) in &snapshot.seen {
            batch.put_cf(seen_cf, url.as_bytes(), [u8::from(*eligible)]);
        }
        for (name, table) in [
            (CF_WORD_COUNTS, &snapshot.word_counts),
            (CF_FREQUENCIES, &snapshot.frequencies),
            (CF_SUBDOMAINS, &snapshot.subdomains),
        ] {
            let cf = self.cf(name)?;
            for (key, count) in table {
                batch.put_cf(cf, key.as_bytes(), count.to_le_bytes());
            }
        }
        let frontier_cf = self.cf(CF_FRONTIER)?;
        for (index, url) in pending.iter().enumerate() {
            batch.put_cf(frontier_cf, (index as u64).to_be_bytes(), url.as_bytes());
        }

        self.db.write(batch)?;
        Ok(())
    }

    pub fn load(&self) -> Result<CrawlSnapshot, StoreError> {
        Ok(CrawlSnapshot {
            seen: self.read_table(CF_SEEN, |value| match value {
                [0] => Some(false),
                [1] => Some(true),
                _ => None,
            })?,
            word_counts: self.read_table(CF_WORD_COUNTS, decode_count)?,
            frequencies: self.read_table(CF_FREQUENCIES, decode_count)?,
            subdomains: self.read_table(CF_SUBDOMAINS, decode_count)?,
        })
    }

    /// URLs that were queued but not yet crawled, in queue order.
    pub fn load_pending(&self) -> Result<Vec<String>, StoreError> {
        let cf = self.cf(CF_FRONTIER)?;
        let mut pending = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let url = String::from_utf8(value.to_vec()).map_err(|_| StoreError::Corrupt {
                cf: CF_FRONTIER,
                key: format!("{key:?}"),
            })?;
            pending.push(url);
        }
        Ok(pending)
    }

    fn read_table<T>(
        &self,
        name: &'static str,
        decode: impl Fn(&[u8]) -> Option<T>,
    ) -> Result<HashMap<String, T>, StoreError> {
        let cf = self.cf(name)?;
        let mut table = HashMap::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec()).map_err(|e| StoreError::Corrupt {
                cf: name,
                key: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            })?;
            let value = decode(&value).ok_or_else(|| StoreError::Corrupt {
                cf: name,
                key: key.clone(),
            })?;
            table.insert(key, value);
        }
        Ok(table)
    }
}

fn decode_count(value: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = value.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}
