// Transaction builder

use crate::chain::Blockchain;
use crate::core::{PubKeyHash, Transaction, TxInput, TxOutput};
use crate::error::{LedgerError, Result};
use crate::wallet::{Address, KeyPair};

/// Builds signed spends against one chain
pub struct TransactionBuilder<'a> {
    chain: &'a Blockchain,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(chain: &'a Blockchain) -> Self {
        Self { chain }
    }

    /// Build a transaction paying `amount` from `from` to `to`, with any
    /// surplus returned to `from` as change
    pub fn build(&self, from: &KeyPair, to: &PubKeyHash, amount: u64) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        // Selection and signing see the same tip
        let view = self.chain.view();
        let sender = from.pubkey_hash();
        let (accumulated, selected) = view.find_spendable_outputs(&sender, amount)?;

        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let inputs = selected
            .iter()
            .map(|utxo| {
                let index = i32::try_from(utxo.outpoint.vout)
                    .map_err(|_| LedgerError::Decode(format!("output index {} out of range", utxo.outpoint.vout)))?;
                Ok(TxInput::new(utxo.outpoint.txid, index, from.pubkey_bytes()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut outputs = vec![TxOutput::new(amount, *to)];
        match accumulated.checked_sub(amount) {
            Some(0) | None => {}
            Some(change) => outputs.push(TxOutput::new(change, sender)),
        }

        let mut tx = Transaction::new(inputs, outputs);
        tx.sign(&from.secret_key, &view)?;

        log::debug!(
            "Built transaction {} spending {} input(s) for {}",
            tx.id,
            tx.inputs.len(),
            amount
        );
        Ok(tx)
    }

    /// `build` with a Base58Check recipient
    pub fn build_to_address(&self, from: &KeyPair, to: &Address, amount: u64) -> Result<Transaction> {
        self.build(from, &to.to_pubkey_hash()?, amount)
    }

    /// Get balance for address
    pub fn get_balance(&self, address: &Address) -> Result<u64> {
        self.chain.balance(&address.to_pubkey_hash()?)
    }
}
