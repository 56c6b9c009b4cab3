mod common;

use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use common::{buyer, dec, engine, product, seller, stock_of};
use phantom_core::{
    Deadline, Decimal, EntityKey, MultiPurchaseRequest, PurchaseFilter, PurchaseLine,
    PurchaseRequest,
};
use phantom_engine::{Engine, EngineConfig, EngineError, ErrorKind};
use phantom_store::{LedgerStore, MemoryStore, UnitOfWork};

#[test]
fn last_unit_is_sold_once() {
    let engine = engine();
    let store = engine.store();
    let shop = seller(store, "Corner", "0");
    let mask = product(store, shop.id, "Last One (black) (1 per pack)", "5.00", 1);
    let buyers = [buyer(store, "100"), buyer(store, "100")];

    let barrier = Barrier::new(buyers.len());
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = buyers
            .iter()
            .map(|b| {
                let engine = &engine;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine.purchase_single(PurchaseRequest {
                        buyer_id: b.id,
                        seller_id: shop.id,
                        product_id: mask.id,
                        quantity: 1,
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let won = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(won, 1, "{results:?}");
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, EngineError::InsufficientStock { .. })));
    assert_eq!(stock_of(&engine, mask.id), 0);
    assert_eq!(engine.seller(shop.id).unwrap().cash_balance, dec("5.00"));
}

#[test]
fn crossing_multi_purchases_all_finish_and_conserve() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 25;

    let engine = engine();
    let store = engine.store();
    let left = seller(store, "Left", "0");
    let right = seller(store, "Right", "0");
    let a = product(store, left.id, "A (blue) (1 per pack)", "1.00", 120);
    let b = product(store, right.id, "B (blue) (1 per pack)", "2.00", 120);
    let buyers: Vec<_> = (0..THREADS).map(|_| buyer(store, "40")).collect();

    let line_a = PurchaseLine {
        seller_id: left.id,
        product_id: a.id,
        quantity: 1,
    };
    let line_b = PurchaseLine {
        seller_id: right.id,
        product_id: b.id,
        quantity: 1,
    };

    thread::scope(|s| {
        for (i, who) in buyers.iter().enumerate() {
            let engine = &engine;
            s.spawn(move || {
                // Half the threads name the products in the opposite order.
                let items = if i % 2 == 0 {
                    vec![line_a, line_b]
                } else {
                    vec![line_b, line_a]
                };
                for _ in 0..ROUNDS {
                    let outcome = engine.purchase_multi(&MultiPurchaseRequest {
                        buyer_id: who.id,
                        items: items.clone(),
                    });
                    if let Err(err) = outcome {
                        assert_ne!(err.kind(), ErrorKind::Internal, "{err}");
                    }
                }
            });
        }
    });

    let records = engine
        .purchases(&PurchaseFilter::all(usize::MAX))
        .unwrap();
    let sold_a = records.iter().filter(|r| r.product_id == a.id).count();
    let sold_b = records.iter().filter(|r| r.product_id == b.id).count();
    assert_eq!(sold_a, sold_b);
    assert_eq!(stock_of(&engine, a.id) as usize, 120 - sold_a);
    assert_eq!(stock_of(&engine, b.id) as usize, 120 - sold_b);

    // Money moves, it is never created or destroyed.
    let buyer_total: Decimal = buyers
        .iter()
        .map(|b| engine.buyer(b.id).unwrap().cash_balance)
        .sum();
    let seller_total = engine.seller(left.id).unwrap().cash_balance
        + engine.seller(right.id).unwrap().cash_balance;
    assert_eq!(buyer_total + seller_total, dec("40") * Decimal::from(THREADS));
    for b in &buyers {
        assert!(engine.buyer(b.id).unwrap().cash_balance >= Decimal::ZERO);
    }
}

#[test]
fn concurrent_decrements_never_go_negative() {
    let engine = engine();
    let store = engine.store();
    let shop = seller(store, "Corner", "0");
    let mask = product(store, shop.id, "Shared (white) (5 per pack)", "1.00", 10);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..20)
            .map(|_| {
                let engine = &engine;
                s.spawn(move || engine.adjust_stock(mask.id, -1, None))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let applied = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 10);
    assert_eq!(stock_of(&engine, mask.id), 0);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, EngineError::InsufficientStock { .. }), "{err}");
    }
}

#[test]
fn lock_wait_timeout_is_a_transient_conflict() {
    let engine = Engine::new(
        MemoryStore::new(),
        EngineConfig {
            lock_timeout: Duration::from_millis(20),
            request_deadline: None,
        },
    );
    let store = engine.store();
    let ann = buyer(store, "100");
    let shop = seller(store, "Corner", "0");
    let mask = product(store, shop.id, "Held (black) (1 per pack)", "1.00", 5);
    let request = PurchaseRequest {
        buyer_id: ann.id,
        seller_id: shop.id,
        product_id: mask.id,
        quantity: 1,
    };

    let mut holder = store.begin(Duration::from_secs(1)).unwrap();
    holder.lock_for_update(EntityKey::Product(mask.id)).unwrap();

    let err = engine.purchase_single(request).unwrap_err();
    assert!(matches!(err, EngineError::TransientConflict { .. }), "{err}");
    assert!(err.is_retryable());
    assert_eq!(stock_of(&engine, mask.id), 5);

    holder.rollback().unwrap();
    engine.purchase_single(request).unwrap();
    assert_eq!(stock_of(&engine, mask.id), 4);
}

#[test]
fn time_spent_on_one_lock_shortens_the_next_wait() {
    let engine = Engine::new(
        MemoryStore::new(),
        EngineConfig {
            lock_timeout: Duration::from_secs(5),
            request_deadline: None,
        },
    );
    let store = engine.store();
    let ann = buyer(store, "100");
    let shop = seller(store, "Corner", "0");
    let mask = product(store, shop.id, "Queued (black) (1 per pack)", "1.00", 5);
    let request = PurchaseRequest {
        buyer_id: ann.id,
        seller_id: shop.id,
        product_id: mask.id,
        quantity: 1,
    };

    let mut seller_holder = store.begin(Duration::from_secs(1)).unwrap();
    seller_holder.lock_for_update(EntityKey::Seller(shop.id)).unwrap();
    let mut product_holder = store.begin(Duration::from_secs(1)).unwrap();
    product_holder.lock_for_update(EntityKey::Product(mask.id)).unwrap();

    // The seller frees up after most of the budget is gone; the product never does.
    let (result, elapsed) = thread::scope(|s| {
        let buying = s.spawn(|| {
            let started = Instant::now();
            let result =
                engine.purchase_single_until(request, Deadline::after(Duration::from_millis(400)));
            (result, started.elapsed())
        });
        thread::sleep(Duration::from_millis(300));
        seller_holder.rollback().unwrap();
        buying.join().unwrap()
    });

    let err = result.unwrap_err();
    assert!(err.is_retryable(), "{err}");
    assert!(elapsed < Duration::from_millis(600), "waited {elapsed:?}");

    product_holder.rollback().unwrap();
    assert_eq!(stock_of(&engine, mask.id), 5);
}
