//! Key encoding for the `RocksDB` column families.
//!
//! IDs are written big-endian so that byte order is numeric order, which keeps
//! index scans sorted by ID and lets the newest purchase sort last.

use phantom_core::{BuyerId, ProductId, PurchaseId, SellerId};

/// Length of one encoded ID.
pub const ID_LEN: usize = 8;

/// Primary key of a buyer row.
#[must_use]
pub fn buyer_key(id: BuyerId) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Primary key of a seller row.
#[must_use]
pub fn seller_key(id: SellerId) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Primary key of a product row.
#[must_use]
pub fn product_key(id: ProductId) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Primary key of a purchase record.
#[must_use]
pub fn purchase_key(id: PurchaseId) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Index key: `seller_id (8 bytes) || product_id (8 bytes)`.
#[must_use]
pub fn seller_product_key(seller_id: SellerId, product_id: ProductId) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 * ID_LEN);
    key.extend_from_slice(&seller_id.to_be_bytes());
    key.extend_from_slice(&product_id.to_be_bytes());
    key
}

/// Index key: `buyer_id (8 bytes) || purchase_id (8 bytes)`.
#[must_use]
pub fn buyer_purchase_key(buyer_id: BuyerId, purchase_id: PurchaseId) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 * ID_LEN);
    key.extend_from_slice(&buyer_id.to_be_bytes());
    key.extend_from_slice(&purchase_id.to_be_bytes());
    key
}

/// Prefix shared by every index entry of one owner.
#[must_use]
pub fn owner_prefix(raw_owner_id: u64) -> Vec<u8> {
    raw_owner_id.to_be_bytes().to_vec()
}

/// Decode a primary key, or `None` if it is not exactly one ID long.
#[must_use]
pub fn decode_id(key: &[u8]) -> Option<u64> {
    let bytes: [u8; ID_LEN] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Take the trailing ID out of a two-part index key.
#[must_use]
pub fn index_suffix(key: &[u8]) -> Option<u64> {
    key.get(ID_LEN..2 * ID_LEN).and_then(decode_id)
}
