//! In-process stand-in for the external catalog.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pricetag_core::{Error, Price, Product, ProductSource};
use uuid::Uuid;

pub enum Reply {
    Found,
    Missing,
    Failing,
    Unavailable,
}

pub struct FakeCatalog {
    reply: Reply,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeCatalog {
    pub fn new(reply: Reply) -> Arc<Self> {
        Self::slow(reply, Duration::ZERO)
    }

    pub fn slow(reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self { reply, calls: AtomicUsize::new(0), delay })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductSource for FakeCatalog {
    async fn fetch_by_code(&self, code: &str) -> Result<Option<Product>, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        match self.reply {
            Reply::Found => Ok(Some(Product {
                id: Uuid::new_v4(),
                barcode: code.to_string(),
                description: "ACHOC PO NESCAU 800G".to_string(),
                sequence_code: 29250,
                prices: vec![Price::observed_now(13.35)],
            })),
            Reply::Missing => Ok(None),
            Reply::Failing => Err(Error::Fetch(format!("{code}: parse error: not an item payload"))),
            Reply::Unavailable => Err(Error::SessionBootstrap("ajax identifier not found".to_string())),
        }
    }
}
