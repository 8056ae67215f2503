//! Account state reader.
//!
//! A blob fetched from an account (rather than emitted by it) is an
//! `Account` structure whose root holds, in order:
//!
//! ```text
//! account$1  addr:MsgAddressInt
//!            storage_stat:(used:(cells, bits, public_cells) last_paid:uint32 due_payment:(Maybe Grams))
//!            last_trans_lt:uint64  balance:(Grams, extra:(Maybe ^Cell))
//!            state:(account_active$1 StateInit | account_uninit$00 | account_frozen$01 ..)
//! StateInit  split_depth:(Maybe (## 5)) special:(Maybe (tick:Bool tock:Bool))
//!            code:(Maybe ^Cell) data:(Maybe ^Cell) library:(Maybe ^Cell)
//! ```
//!
//! Only active accounts carrying both code and data are accepted; the reader
//! hands back the indices of those two cells.

use alloy_primitives::U256;
use cellbridge_core::DecodeError;
use tracing::debug;

use crate::cell::CellTree;
use crate::slice::CellSlice;

/// Internal address of the account owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAddress {
    pub workchain: i32,
    /// Address bits packed MSB-first.
    pub address: Vec<u8>,
    pub bits: u16,
}

/// Cells and bits the account occupies in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageUsed {
    pub cells: u64,
    pub bits: u64,
    pub public_cells: u64,
}

/// An active account with its code and data cells located in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub address: AccountAddress,
    pub storage: StorageUsed,
    pub last_paid: u32,
    pub due_payment: Option<U256>,
    pub last_trans_lt: u64,
    pub balance: U256,
    /// Index of the extra-currency dictionary root, if any.
    pub extra_currencies: Option<usize>,
    pub split_depth: Option<u8>,
    /// `(tick, tock)` flags of special accounts.
    pub tick_tock: Option<(bool, bool)>,
    /// Index of the code cell.
    pub code: usize,
    /// Index of the persistent data cell.
    pub data: usize,
    /// Index of the library dictionary root, if any.
    pub library: Option<usize>,
}

/// Read the account state held by the primary root of `tree`.
pub fn read_account_state(tree: &CellTree) -> Result<AccountState, DecodeError> {
    let root = tree
        .root()
        .ok_or_else(|| DecodeError::malformed("missing root"))?;
    let mut slice = CellSlice::single(tree, root)?;

    if !slice.load_bit()? {
        return Err(DecodeError::unsupported("account_none: blob holds no account"));
    }
    let address = read_address(&mut slice)?;
    let storage = StorageUsed {
        cells: load_var_u64(&mut slice, 3)?,
        bits: load_var_u64(&mut slice, 3)?,
        public_cells: load_var_u64(&mut slice, 3)?,
    };
    let last_paid = slice.load_u64(32)? as u32;
    let due_payment = if slice.load_bit()? {
        Some(load_grams(&mut slice)?)
    } else {
        None
    };
    let last_trans_lt = slice.load_u64(64)?;
    let balance = load_grams(&mut slice)?;
    let extra_currencies = maybe_ref(&mut slice)?;

    if !slice.load_bit()? {
        let status = if slice.load_bit()? { "frozen" } else { "uninit" };
        return Err(DecodeError::unsupported(format!("account is not active ({status})")));
    }
    let split_depth = if slice.load_bit()? {
        Some(slice.load_u64(5)? as u8)
    } else {
        None
    };
    let tick_tock = if slice.load_bit()? {
        Some((slice.load_bit()?, slice.load_bit()?))
    } else {
        None
    };
    let code = maybe_ref(&mut slice)?
        .ok_or_else(|| DecodeError::unsupported("account has no code"))?;
    let data = maybe_ref(&mut slice)?
        .ok_or_else(|| DecodeError::unsupported("account has no data"))?;
    let library = maybe_ref(&mut slice)?;

    debug!(
        workchain = address.workchain,
        code,
        data,
        last_trans_lt,
        "account state read"
    );
    Ok(AccountState {
        address,
        storage,
        last_paid,
        due_payment,
        last_trans_lt,
        balance,
        extra_currencies,
        split_depth,
        tick_tock,
        code,
        data,
        library,
    })
}

/// `addr_std$10` or `addr_var$11`, each with an optional anycast prefix.
fn read_address(slice: &mut CellSlice<'_>) -> Result<AccountAddress, DecodeError> {
    let tag = slice.load_u64(2)?;
    if tag & 0b10 == 0 {
        return Err(DecodeError::unsupported(format!(
            "account address: expected addr_std or addr_var, found 0b{tag:02b}"
        )));
    }
    if slice.load_bit()? {
        let depth = slice.load_u64(5)? as usize;
        slice.load_bits(depth)?;
    }
    if tag == 0b10 {
        let workchain = slice.load_int(8)?;
        let address = slice.load_bits(256)?;
        return Ok(AccountAddress {
            workchain: i32::try_from(workchain)
                .map_err(|_| DecodeError::malformed("workchain out of range"))?,
            address,
            bits: 256,
        });
    }
    let bits = slice.load_u64(9)? as u16;
    let workchain = slice.load_int(32)?;
    let address = slice.load_bits(bits as usize)?;
    Ok(AccountAddress {
        workchain: i32::try_from(workchain)
            .map_err(|_| DecodeError::malformed("workchain out of range"))?,
        address,
        bits,
    })
}

/// `VarUInteger n`: a byte count in `len_bits` bits, then that many bytes.
fn load_var_u64(slice: &mut CellSlice<'_>, len_bits: usize) -> Result<u64, DecodeError> {
    let len = slice.load_u64(len_bits)? as usize;
    if len > 8 {
        return Err(DecodeError::unsupported(format!(
            "variable integer of {len} bytes exceeds 64 bits"
        )));
    }
    slice.load_u64(len * 8)
}

/// `Grams`, i.e. `VarUInteger 16`.
fn load_grams(slice: &mut CellSlice<'_>) -> Result<U256, DecodeError> {
    let len = slice.load_u64(4)? as usize;
    slice.load_uint(len * 8)
}

fn maybe_ref(slice: &mut CellSlice<'_>) -> Result<Option<usize>, DecodeError> {
    if slice.load_bit()? {
        slice.load_ref().map(Some)
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CellBuilder, TreeBuilder};

    /// Root cell of an active account; `state` writes everything after the balance.
    fn account(state: impl FnOnce(&mut CellBuilder)) -> CellTree {
        let mut tb = TreeBuilder::new();
        let mut root = CellBuilder::new();
        root.store_bit(true).unwrap();
        root.store_u64(0b10, 2).unwrap().store_bit(false).unwrap();
        root.store_u64(0xff, 8).unwrap(); // workchain -1
        root.store_bits(&[0x33; 32], 256).unwrap();
        // used: cells=3 (1 byte), bits=1000 (2 bytes), public_cells=0
        root.store_u64(1, 3).unwrap().store_u64(3, 8).unwrap();
        root.store_u64(2, 3).unwrap().store_u64(1000, 16).unwrap();
        root.store_u64(0, 3).unwrap();
        root.store_u64(1_700_000_000, 32).unwrap();
        root.store_bit(false).unwrap();
        root.store_u64(42, 64).unwrap();
        root.store_u64(2, 4).unwrap().store_u64(500, 16).unwrap();
        root.store_bit(false).unwrap();
        state(&mut root);
        let code = tb.push(CellBuilder::new().build().unwrap());
        let data = tb.push(CellBuilder::new().build().unwrap());
        assert_eq!((code, data), (0, 1));
        let root_index = tb.push(root.build().unwrap());
        tb.finish(vec![root_index])
    }

    fn active(code: bool, data: bool) -> impl FnOnce(&mut CellBuilder) {
        move |c: &mut CellBuilder| {
            c.store_bit(true).unwrap();
            c.store_bit(false).unwrap().store_bit(false).unwrap();
            c.store_bit(code).unwrap();
            if code {
                c.store_ref(0).unwrap();
            }
            c.store_bit(data).unwrap();
            if data {
                c.store_ref(1).unwrap();
            }
            c.store_bit(false).unwrap();
        }
    }

    #[test]
    fn active_account_fields() {
        let state = read_account_state(&account(active(true, true))).unwrap();
        assert_eq!(state.address.workchain, -1);
        assert_eq!(state.address.address, vec![0x33; 32]);
        assert_eq!(
            state.storage,
            StorageUsed { cells: 3, bits: 1000, public_cells: 0 }
        );
        assert_eq!(state.last_paid, 1_700_000_000);
        assert_eq!(state.due_payment, None);
        assert_eq!(state.last_trans_lt, 42);
        assert_eq!(state.balance, U256::from(500u64));
        assert_eq!((state.code, state.data), (0, 1));
        assert_eq!(state.library, None);
    }

    #[test]
    fn missing_code_or_data() {
        let err = read_account_state(&account(active(false, true))).unwrap_err();
        assert_eq!(err, DecodeError::unsupported("account has no code"));
        let err = read_account_state(&account(active(true, false))).unwrap_err();
        assert_eq!(err, DecodeError::unsupported("account has no data"));
    }

    #[test]
    fn inactive_account() {
        let frozen = account(|c| {
            c.store_u64(0b01, 2).unwrap();
            c.store_bits(&[0; 32], 256).unwrap();
        });
        let err = read_account_state(&frozen).unwrap_err();
        assert_eq!(err, DecodeError::unsupported("account is not active (frozen)"));
    }

    #[test]
    fn account_none() {
        let mut tb = TreeBuilder::new();
        let mut c = CellBuilder::new();
        c.store_bit(false).unwrap();
        let root = tb.push(c.build().unwrap());
        let err = read_account_state(&tb.finish(vec![root])).unwrap_err();
        assert_eq!(err.kind(), "unsupported_message_kind");
    }

    #[test]
    fn truncated_root_is_malformed() {
        let err = read_account_state(&account(|c| {
            c.store_bit(true).unwrap();
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
    }
}
