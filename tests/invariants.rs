//! Property tests for the accounting invariants of the collateral core.

use proptest::prelude::*;

use musd_core::core::config::CollateralParams;
use musd_core::core::vault::CollateralVault;
use musd_core::error::Error;
use musd_core::external::{
    BorrowLedger, CollateralView, InMemoryBorrowLedger, InMemoryTokenBank, StaticPriceOracle,
    TokenBank,
};
use musd_core::governance::access::Role;
use musd_core::liquidation::engine::LiquidationEngine;
use musd_core::protocol::state_machine::ProtocolStateMachine;
use musd_core::utils::address::Address;
use musd_core::utils::constants::DEBT_TOKEN_UNIT;

const UNIT: u128 = DEBT_TOKEN_UNIT;

type Protocol = ProtocolStateMachine<InMemoryBorrowLedger, StaticPriceOracle, InMemoryTokenBank>;

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

fn borrower(i: usize) -> Address {
    addr(&format!("borrower-{}", i))
}

/// WETH at `price_usd` with 80% threshold and `penalty_bps`; each borrower
/// gets `funds` WETH minted and approved
fn world(price_usd: u128, penalty_bps: u64, borrowers: usize, funds: u128) -> Protocol {
    let (admin, vault_addr, engine_addr) = (addr("admin"), addr("vault"), addr("engine"));
    let (weth, musd, keeper) = (addr("weth"), addr("musd"), addr("keeper"));

    let vault = CollateralVault::new(vault_addr, admin, addr("borrow-module")).unwrap();
    let engine = LiquidationEngine::new(engine_addr, musd, admin).unwrap();

    let mut bank = InMemoryTokenBank::new();
    bank.register_token(weth, 18);
    bank.register_token(musd, 18);
    for i in 0..borrowers {
        bank.mint(&weth, &borrower(i), funds).unwrap();
        bank.approve(&weth, &borrower(i), &vault_addr, u128::MAX);
    }
    bank.mint(&musd, &keeper, 1_000_000_000 * UNIT).unwrap();
    bank.approve(&musd, &keeper, &engine_addr, u128::MAX);

    let mut oracle = StaticPriceOracle::new();
    oracle.set_price(weth, price_usd * UNIT, 18);

    let mut p = ProtocolStateMachine::new(
        vault,
        engine,
        InMemoryBorrowLedger::new(),
        oracle,
        bank,
        1_700_000_000,
    );
    p.grant_vault_role(admin, Role::Governance, addr("gov")).unwrap();
    p.grant_vault_role(admin, Role::Liquidation, engine_addr).unwrap();
    p.add_collateral(addr("gov"), weth, CollateralParams::new(7_500, 8_000, penalty_bps))
        .unwrap();
    p
}

#[derive(Debug, Clone)]
enum CustodyOp {
    Deposit(u128),
    Withdraw(u128),
    Seize(u128),
}

fn custody_op() -> impl Strategy<Value = CustodyOp> {
    prop_oneof![
        (0u128..=5 * UNIT).prop_map(CustodyOp::Deposit),
        (0u128..=5 * UNIT).prop_map(CustodyOp::Withdraw),
        (0u128..=5 * UNIT).prop_map(CustodyOp::Seize),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_deposit_accounting(ops in prop::collection::vec(custody_op(), 1..40)) {
        let mut p = world(2_000, 500, 1, 100 * UNIT);
        let (user, weth) = (borrower(0), addr("weth"));
        let mut expected = 0u128;

        for op in ops {
            match op {
                CustodyOp::Deposit(amount) => {
                    if p.deposit(user, weth, amount).is_ok() {
                        expected += amount;
                    }
                }
                CustodyOp::Withdraw(amount) => {
                    if p.withdraw(addr("borrow-module"), user, weth, amount).is_ok() {
                        expected -= amount;
                    }
                }
                CustodyOp::Seize(amount) => {
                    if p.seize(addr("engine"), user, weth, amount, addr("keeper")).is_ok() {
                        expected -= amount;
                    }
                }
            }
            prop_assert_eq!(p.vault().deposit_of(&user, &weth), expected);
            prop_assert_eq!(p.vault().total_deposits(&weth), expected);
            prop_assert!(p.verify_invariants().is_ok());
        }
        // Custody is backed one to one
        prop_assert_eq!(p.bank().balance_of(&weth, &addr("vault")), expected);
    }

    #[test]
    fn prop_bad_debt_total_matches_records(
        positions in prop::collection::vec((1u128..=20u128, 100u128..=60_000u128), 1..6),
        repays in prop::collection::vec((0usize..6, 100u128..=40_000u128), 1..12),
    ) {
        let mut p = world(2_000, 500, positions.len(), 20 * UNIT);
        let weth = addr("weth");
        for (i, (tenths, debt)) in positions.iter().enumerate() {
            p.deposit(borrower(i), weth, tenths * UNIT / 10).unwrap();
            p.ledger_mut().set_debt(borrower(i), debt * UNIT);
        }

        for (who, repay) in repays {
            let b = borrower(who % positions.len());
            let _ = p.liquidate(addr("keeper"), b, weth, repay * UNIT);

            let sum: u128 = (0..positions.len())
                .map(|i| p.engine().borrower_bad_debt(&borrower(i)))
                .sum();
            prop_assert_eq!(p.engine().total_bad_debt(), sum);
            prop_assert!(p.verify_invariants().is_ok());
        }
    }

    #[test]
    fn prop_seizure_never_exceeds_deposit(
        tenths in 1u128..=100u128,
        debt in 100u128..=200_000u128,
        repay in 100u128..=200_000u128,
        price in 100u128..=5_000u128,
        penalty in 100u64..=2_000u64,
    ) {
        let mut p = world(price, penalty, 1, 10 * UNIT);
        let (user, weth) = (borrower(0), addr("weth"));
        let deposit = tenths * UNIT / 10;
        p.deposit(user, weth, deposit).unwrap();
        p.ledger_mut().set_debt(user, debt * UNIT);

        let debt_before = p.ledger().total_debt(&user);
        if let Ok(outcome) = p.liquidate(addr("keeper"), user, weth, repay * UNIT) {
            prop_assert!(outcome.collateral_seized <= deposit);
            prop_assert_eq!(
                p.vault().deposit_of(&user, &weth),
                deposit - outcome.collateral_seized
            );
            prop_assert!(outcome.debt_repaid <= debt_before);
            prop_assert_eq!(p.ledger().total_debt(&user), debt_before - outcome.debt_repaid);
            prop_assert_eq!(p.bank().balance_of(&weth, &addr("keeper")), outcome.collateral_seized);
        } else {
            prop_assert_eq!(p.vault().deposit_of(&user, &weth), deposit);
            prop_assert_eq!(p.ledger().total_debt(&user), debt_before);
        }
    }

    #[test]
    fn prop_healthy_positions_reject(
        tenths in 1u128..=100u128,
        price in 100u128..=5_000u128,
        utilisation_bps in 1u128..=10_000u128,
    ) {
        let mut p = world(price, 500, 1, 10 * UNIT);
        let (user, weth) = (borrower(0), addr("weth"));
        p.deposit(user, weth, tenths * UNIT / 10).unwrap();

        // Debt at or under the threshold-weighted value keeps hf >= 1.0
        let weighted = tenths * price * UNIT / 10 * 8_000 / 10_000;
        let debt = (weighted * utilisation_bps / 10_000).max(1);
        p.ledger_mut().set_debt(user, debt);

        let result = p.liquidate(addr("keeper"), user, weth, 1_000 * UNIT);
        let healthy = matches!(
            result,
            Err(Error::PositionHealthy { health_factor }) if health_factor >= 10_000
        );
        prop_assert!(healthy, "unexpected result {:?}", result);
        prop_assert!(!p.is_liquidatable(&user).unwrap());
    }

    #[test]
    fn prop_estimate_matches_uncapped_liquidation(
        debt in 17_000u128..=19_900u128,
        repay in 100u128..=5_000u128,
    ) {
        let mut p = world(2_000, 500, 1, 10 * UNIT);
        let (user, weth) = (borrower(0), addr("weth"));
        p.deposit(user, weth, 10 * UNIT).unwrap();
        p.ledger_mut().set_debt(user, debt * UNIT);

        let quote = p.estimate_seize(&user, &weth, repay * UNIT).unwrap();
        let outcome = p.liquidate(addr("keeper"), user, weth, repay * UNIT).unwrap();
        prop_assert!(!quote.capped);
        prop_assert_eq!(quote.collateral_to_seize, outcome.collateral_seized);
        prop_assert_eq!(quote.debt_to_repay, outcome.debt_repaid);
    }
}
