//! Product and price persistence.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::{params, rusqlite};
use uuid::Uuid;

use super::ProductStore;
use super::connection::ProductDb;
use crate::Error;
use crate::model::{Price, PriceRecord, Product};
use crate::page::{Page, PageRequest, ProductSort};

const SELECT_RECORDS: &str = "SELECT p.id, p.barcode, p.description, p.sequence_code, pr.id, pr.value, pr.created_at
    FROM prices pr
    JOIN products p ON p.id = pr.product_id";

/// Matches every product when `?1` is NULL, otherwise a case-insensitive substring of the description.
const DESCRIPTION_FILTER: &str = "(?1 IS NULL OR instr(lower(description), lower(?1)) > 0)";

/// `LIMIT -1 OFFSET 0`: no window.
const UNBOUNDED: (i64, i64) = (-1, 0);

/// Price limit meaning the whole history.
const ALL_PRICES: i64 = -1;

/// Row as stored, before the text columns are parsed.
struct RawRecord {
    product_id: String,
    barcode: String,
    description: String,
    sequence_code: i64,
    price_id: String,
    value: f64,
    created_at: String,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            product_id: row.get(0)?,
            barcode: row.get(1)?,
            description: row.get(2)?,
            sequence_code: row.get(3)?,
            price_id: row.get(4)?,
            value: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<PriceRecord, Error> {
        let product_id = parse_uuid(&self.product_id)?;
        let price = parse_price(&self.price_id, self.value, &self.created_at)?;

        Ok(PriceRecord {
            product_id,
            barcode: self.barcode,
            description: self.description,
            sequence_code: self.sequence_code,
            price,
        })
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(raw).map_err(|e| Error::CorruptRow(format!("id {raw:?}: {e}")))
}

fn parse_price(id: &str, value: f64, created_at: &str) -> Result<Price, Error> {
    let observed_at = DateTime::parse_from_rfc3339(created_at)
        .map_err(|e| Error::CorruptRow(format!("created_at {created_at:?}: {e}")))?
        .with_timezone(&Utc);
    Ok(Price { id: parse_uuid(id)?, value, observed_at })
}

fn price_columns(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, f64, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn collect_records(stmt: &mut rusqlite::Statement<'_>, params: impl rusqlite::Params) -> Result<Vec<PriceRecord>, Error> {
    let rows = stmt.query_map(params, RawRecord::from_row)?;
    rows.map(|row| row.map_err(Error::from).and_then(RawRecord::into_record))
        .collect()
}

fn count_matching(conn: &rusqlite::Connection, contains: Option<&str>) -> Result<u64, Error> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM products WHERE {DESCRIPTION_FILTER}"),
        params![contains],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Products in `sort` order within `window` (limit, offset), each carrying
/// up to `price_limit` of its newest prices.
fn select_products(
    conn: &rusqlite::Connection, contains: Option<&str>, sort: ProductSort, window: (i64, i64), price_limit: i64,
) -> Result<Vec<Product>, Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, barcode, description, sequence_code FROM products
        WHERE {DESCRIPTION_FILTER}
        ORDER BY {}
        LIMIT ?2 OFFSET ?3",
        sort.order_by()
    ))?;
    let heads = stmt
        .query_map(params![contains, window.0, window.1], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, i64>(3)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut prices = conn.prepare(
        "SELECT id, value, created_at FROM prices
        WHERE product_id = ?1
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?2",
    )?;

    heads
        .into_iter()
        .map(|(id, barcode, description, sequence_code)| -> Result<Product, Error> {
            let history = prices
                .query_map(params![&id, price_limit], price_columns)?
                .map(|row| {
                    let (price_id, value, created_at) = row?;
                    parse_price(&price_id, value, &created_at)
                })
                .collect::<Result<Vec<_>, Error>>()?;

            Ok(Product { id: parse_uuid(&id)?, barcode, description, sequence_code, prices: history })
        })
        .collect()
}

impl ProductDb {
    /// Price rows for a barcode, newest first.
    ///
    /// `limit == 0` returns every row.
    pub async fn find_records_by_code(&self, code: &str, limit: usize) -> Result<Vec<PriceRecord>, Error> {
        let code = code.to_string();
        let limit = if limit == 0 { -1 } else { i64::try_from(limit).unwrap_or(i64::MAX) };

        self.conn
            .call(move |conn| -> Result<Vec<PriceRecord>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_RECORDS}
                    WHERE p.barcode = ?1
                    ORDER BY pr.created_at DESC, pr.rowid DESC
                    LIMIT ?2"
                ))?;
                collect_records(&mut stmt, params![code, limit])
            })
            .await
            .map_err(Error::from)
    }

    /// Every price row ordered by product description, then newest price first.
    pub async fn find_all(&self) -> Result<Vec<PriceRecord>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<PriceRecord>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_RECORDS}
                    ORDER BY p.description ASC, p.id ASC, pr.created_at DESC, pr.rowid DESC"
                ))?;
                collect_records(&mut stmt, [])
            })
            .await
            .map_err(Error::from)
    }

    /// Persist a product and its prices in one transaction.
    ///
    /// The product row is find-or-create by barcode: when the barcode already
    /// exists its row is kept and the prices are attached to it.
    pub async fn save(&self, product: &Product) -> Result<(), Error> {
        let product = product.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;

                let inserted = tx.execute(
                    "INSERT INTO products (id, barcode, description, sequence_code, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(barcode) DO NOTHING",
                    params![
                        product.id.to_string(),
                        &product.barcode,
                        &product.description,
                        product.sequence_code,
                        timestamp(Utc::now()),
                    ],
                )?;

                let product_id: String =
                    tx.query_row("SELECT id FROM products WHERE barcode = ?1", params![&product.barcode], |row| {
                        row.get(0)
                    })?;

                for price in &product.prices {
                    tx.execute(
                        "INSERT INTO prices (id, product_id, value, created_at)
                        VALUES (?1, ?2, ?3, ?4)
                        ON CONFLICT(id) DO NOTHING",
                        params![price.id.to_string(), &product_id, price.value, timestamp(price.observed_at)],
                    )?;
                }

                tx.commit()?;

                tracing::debug!(
                    barcode = %product.barcode,
                    created = inserted == 1,
                    prices = product.prices.len(),
                    "product saved"
                );
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Every product with its full price history, in `sort` order.
    pub async fn find_sorted(&self, sort: ProductSort) -> Result<Vec<Product>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Product>, Error> {
                select_products(conn, None, sort, UNBOUNDED, ALL_PRICES)
            })
            .await
            .map_err(Error::from)
    }

    /// One page of products with their full price history.
    pub async fn find_page(&self, request: &PageRequest) -> Result<Page<Product>, Error> {
        self.browse(None, *request).await
    }

    /// Every product with only its newest price, ordered by description.
    pub async fn find_all_with_latest_price(&self) -> Result<Vec<Product>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Product>, Error> {
                select_products(conn, None, ProductSort::default(), UNBOUNDED, 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Page of products whose description contains `query`, ignoring case.
    ///
    /// An empty query yields an empty page without touching the database.
    pub async fn search_by_description(&self, query: &str, request: &PageRequest) -> Result<Page<Product>, Error> {
        if query.is_empty() {
            return Ok(Page::empty(request));
        }
        self.browse(Some(query.to_string()), *request).await
    }

    async fn browse(&self, contains: Option<String>, request: PageRequest) -> Result<Page<Product>, Error> {
        self.conn
            .call(move |conn| -> Result<Page<Product>, Error> {
                let contains = contains.as_deref();
                let total = count_matching(conn, contains)?;
                let items =
                    select_products(conn, contains, request.sort, (request.limit(), request.offset()), ALL_PRICES)?;
                Ok(Page::new(items, &request, total))
            })
            .await
            .map_err(Error::from)
    }

    pub async fn find_price_by_id(&self, id: Uuid) -> Result<Option<Price>, Error> {
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Price>, Error> {
                let row = conn
                    .query_row("SELECT id, value, created_at FROM prices WHERE id = ?1", params![id], price_columns)
                    .optional()?;
                row.map(|(id, value, created_at)| parse_price(&id, value, &created_at)).transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// Number of persisted products.
    pub async fn count_products(&self) -> Result<u64, Error> {
        self.count("SELECT COUNT(*) FROM products").await
    }

    /// Number of persisted price rows.
    pub async fn count_prices(&self) -> Result<u64, Error> {
        self.count("SELECT COUNT(*) FROM prices").await
    }

    async fn count(&self, sql: &'static str) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(count.max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl ProductStore for ProductDb {
    async fn find_records_by_code(&self, code: &str, limit: usize) -> Result<Vec<PriceRecord>, Error> {
        ProductDb::find_records_by_code(self, code, limit).await
    }

    async fn find_all(&self) -> Result<Vec<PriceRecord>, Error> {
        ProductDb::find_all(self).await
    }

    async fn save(&self, product: &Product) -> Result<(), Error> {
        ProductDb::save(self, product).await
    }

    async fn find_sorted(&self, sort: ProductSort) -> Result<Vec<Product>, Error> {
        ProductDb::find_sorted(self, sort).await
    }

    async fn find_page(&self, request: &PageRequest) -> Result<Page<Product>, Error> {
        ProductDb::find_page(self, request).await
    }

    async fn find_all_with_latest_price(&self) -> Result<Vec<Product>, Error> {
        ProductDb::find_all_with_latest_price(self).await
    }

    async fn search_by_description(&self, query: &str, request: &PageRequest) -> Result<Page<Product>, Error> {
        ProductDb::search_by_description(self, query, request).await
    }

    async fn find_price_by_id(&self, id: Uuid) -> Result<Option<Price>, Error> {
        ProductDb::find_price_by_id(self, id).await
    }
}
