use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use kemah_store::{normalize_header, CellRef, Record, RecordStore, Table};
use kemah_types::Rupiah;

use crate::collaborators::{Catalog, Product};
use crate::error::{LedgerError, LedgerResult};
use crate::schema::catalog as col;

fn product_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// In-memory catalog for tests and embedding.
///
/// Counts `decrement_stock` calls so tests can assert a side effect ran
/// exactly once.
pub struct InMemoryCatalog {
    products: RwLock<BTreeMap<String, Product>>,
    decrements: AtomicU64,
    failures: AtomicU64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            decrements: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn with_product(self, product: Product) -> Self {
        self.products
            .write()
            .expect("lock poisoned")
            .insert(product_key(&product.name), product);
        self
    }

    pub fn stock(&self, name: &str) -> Option<u64> {
        self.products
            .read()
            .expect("lock poisoned")
            .get(&product_key(name))
            .map(|p| p.stock)
    }

    /// Make the next `count` decrements fail without touching stock.
    pub fn fail_decrements(&self, count: u64) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of `decrement_stock` calls that found their product.
    pub fn decrement_count(&self) -> u64 {
        self.decrements.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn find_product(&self, name: &str) -> LedgerResult<Option<Product>> {
        Ok(self
            .products
            .read()
            .expect("lock poisoned")
            .get(&product_key(name))
            .cloned())
    }

    async fn decrement_stock(&self, name: &str, quantity: u32) -> LedgerResult<u64> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LedgerError::collaborator("catalog", "injected failure"));
        }
        let mut products = self.products.write().expect("lock poisoned");
        let product = products
            .get_mut(&product_key(name))
            .ok_or_else(|| LedgerError::RecordNotFound {
                table: "catalog".into(),
                id: name.to_string(),
            })?;
        product.stock = product.stock.saturating_sub(u64::from(quantity));
        self.decrements.fetch_add(1, Ordering::SeqCst);
        Ok(product.stock)
    }
}

impl std::fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.products.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryCatalog")
            .field("product_count", &count)
            .field("decrements", &self.decrement_count())
            .finish()
    }
}

/// Catalog read from the marketplace sheet.
///
/// Column labels vary between sheet revisions (`Product Name` or `Nama
/// Barang`, `Stok` or `# Stock`), so columns are resolved by alias on every
/// call. Products match by name, case-insensitively.
pub struct SheetCatalog {
    store: Arc<dyn RecordStore>,
    table: String,
}

impl SheetCatalog {
    pub fn new(store: Arc<dyn RecordStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    fn name_column(&self, grid: &Table) -> LedgerResult<usize> {
        col::NAME
            .iter()
            .find_map(|alias| grid.column_index(alias))
            .ok_or_else(|| LedgerError::ColumnNotFound {
                table: self.table.clone(),
                column: "Product Name".into(),
            })
    }

    fn stock_column(&self, grid: &Table) -> LedgerResult<usize> {
        grid.headers
            .iter()
            .position(|h| {
                let key = normalize_header(h);
                key.contains("stok") || key.contains("stock")
            })
            .ok_or_else(|| LedgerError::ColumnNotFound {
                table: self.table.clone(),
                column: "Stock".into(),
            })
    }

    /// One-based physical row of the product.
    fn find_row(&self, grid: &Table, name_column: usize, name: &str) -> Option<usize> {
        let wanted = product_key(name);
        grid.rows
            .iter()
            .position(|row| row.get(name_column).is_some_and(|v| product_key(v) == wanted))
            .map(|index| index + 2)
    }
}

fn product_from(record: &Record, name: &str, stock: &str) -> Product {
    let supplier_email = record.get_any(col::SUPPLIER_EMAIL);
    // "Toko Kemah <toko@example.com>" → "toko@example.com"
    let supplier_email = match (supplier_email.find('<'), supplier_email.find('>')) {
        (Some(open), Some(close)) if open < close => &supplier_email[open + 1..close],
        _ => supplier_email,
    };
    Product {
        name: name.trim().to_string(),
        unit_price: Rupiah::parse_lenient(record.get_any(col::PRICE)),
        stock: Rupiah::parse_lenient(stock).amount(),
        discontinued: record.get_any(col::DISCONTINUED).eq_ignore_ascii_case("yes"),
        supplier_name: record.get_any(col::SUPPLIER_NAME).to_string(),
        supplier_phone: record.get_any(col::SUPPLIER_PHONE).to_string(),
        supplier_email: supplier_email.trim().to_string(),
    }
}

#[async_trait]
impl Catalog for SheetCatalog {
    async fn find_product(&self, name: &str) -> LedgerResult<Option<Product>> {
        let grid = self.store.read_table(&self.table).await?;
        let name_column = self.name_column(&grid)?;
        let stock_column = self.stock_column(&grid)?;
        let Some(row) = self.find_row(&grid, name_column, name) else {
            return Ok(None);
        };
        let record = grid.record_at(row).unwrap_or_default();
        let stock = grid.cell(CellRef::new(row, stock_column));
        let name = grid.cell(CellRef::new(row, name_column));
        Ok(Some(product_from(&record, name, stock)))
    }

    async fn decrement_stock(&self, name: &str, quantity: u32) -> LedgerResult<u64> {
        let grid = self.store.read_table(&self.table).await?;
        let name_column = self.name_column(&grid)?;
        let stock_column = self.stock_column(&grid)?;
        let row = self
            .find_row(&grid, name_column, name)
            .ok_or_else(|| LedgerError::RecordNotFound {
                table: self.table.clone(),
                id: name.to_string(),
            })?;
        let cell = CellRef::new(row, stock_column);
        let current = Rupiah::parse_lenient(grid.cell(cell)).amount();
        let next = current.saturating_sub(u64::from(quantity));
        self.store.write_cell(&self.table, cell, &next.to_string()).await?;
        tracing::info!(table = %self.table, item = name, from = current, to = next, "stock decremented");
        Ok(next)
    }
}

impl std::fmt::Debug for SheetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetCatalog").field("table", &self.table).finish()
    }
}
