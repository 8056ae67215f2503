//! `cellbridge inspect`: dump the decoded cell tree.

use anyhow::{Context, Result};
use cellbridge::{read_account_state, Bridge};

pub fn run(bridge: &Bridge, blob: &str) -> Result<()> {
    let tree = bridge.decode_tree(blob).context("decode bag of cells")?;
    println!("Cells: {}", tree.len());
    println!("Roots: {:?}", tree.roots());
    for (i, cell) in tree.cells().iter().enumerate() {
        let special = if cell.is_special() { " [special]" } else { "" };
        println!(
            "  #{i}: {} bits, refs {:?}{special}  {}",
            cell.bit_len(),
            cell.references(),
            cell.to_hex_string()
        );
    }

    if let Ok(account) = read_account_state(&tree) {
        println!("Account state:");
        println!(
            "  address:       {}:{}",
            account.address.workchain,
            hex::encode(&account.address.address)
        );
        println!("  balance:       {}", account.balance);
        println!("  last_trans_lt: {}", account.last_trans_lt);
        println!(
            "  storage:       {} cells, {} bits",
            account.storage.cells, account.storage.bits
        );
        println!("  code:          cell #{}", account.code);
        println!("  data:          cell #{}", account.data);
    }
    Ok(())
}
