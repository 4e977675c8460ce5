// Unspent output index, rebuilt by scanning the chain

use super::ChainView;
use crate::core::{Hash256, PubKeyHash, Transaction, TxInput, TxOutput, TxResolver};
use crate::error::{LedgerError, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Output identifier - transaction id + output index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// The output an input spends, `None` for coinbase inputs
    pub fn from_input(input: &TxInput) -> Option<Self> {
        let vout = u32::try_from(input.prev_index).ok()?;
        Some(Self::new(input.prev_txid, vout))
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// An unspent output and where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub output: TxOutput,
}

/// Unspent outputs in chain scan order: newest block first, then
/// transaction order within a block, then output index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: Vec<Utxo>,
    index: HashMap<OutPoint, usize>,
}

impl UtxoSet {
    /// Add an entry; an outpoint can only be present once
    fn push(&mut self, utxo: Utxo) -> Result<()> {
        if self.index.contains_key(&utxo.outpoint) {
            return Err(LedgerError::DuplicateTransaction(utxo.outpoint.txid));
        }
        self.index.insert(utxo.outpoint, self.entries.len());
        self.entries.push(utxo);
        Ok(())
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.index.get(outpoint).map(|&i| &self.entries[i].output)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.index.contains_key(outpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unspent outputs locked to `owner`
    pub fn owned_by<'a>(&'a self, owner: &'a PubKeyHash) -> impl Iterator<Item = &'a Utxo> + 'a {
        self.entries
            .iter()
            .filter(move |utxo| utxo.output.is_locked_with_key(owner))
    }

    pub fn balance(&self, owner: &PubKeyHash) -> Result<u64> {
        self.owned_by(owner)
            .try_fold(0u64, |acc, utxo| acc.checked_add(utxo.output.value))
            .ok_or(LedgerError::ValueOverflow)
    }

    /// Unspent output indices grouped by transaction id
    pub fn by_transaction(&self) -> HashMap<Hash256, Vec<u32>> {
        let mut grouped: HashMap<Hash256, Vec<u32>> = HashMap::new();
        for utxo in &self.entries {
            grouped.entry(utxo.outpoint.txid).or_default().push(utxo.outpoint.vout);
        }
        grouped
    }

    /// Greedily take `owner`'s outputs in scan order until their sum
    /// reaches `amount`. Returns the sum and the outputs taken; the sum
    /// is below `amount` when `owner` cannot cover it.
    pub fn select(&self, owner: &PubKeyHash, amount: u64) -> Result<(u64, Vec<Utxo>)> {
        let mut accumulated = 0u64;
        let mut selected = Vec::new();

        for utxo in self.owned_by(owner) {
            if accumulated >= amount {
                break;
            }
            accumulated = accumulated
                .checked_add(utxo.output.value)
                .ok_or(LedgerError::ValueOverflow)?;
            selected.push(utxo.clone());
        }

        Ok((accumulated, selected))
    }
}

impl ChainView<'_> {
    /// Every output not referenced by any input anywhere on the chain.
    /// A spend counts no matter which block holds it, so a spender in
    /// the same block as the output it spends is handled too. A
    /// transaction id seen twice is an error.
    pub fn scan_utxo(&self) -> Result<UtxoSet> {
        let mut outputs = Vec::new();
        let mut spent = HashSet::new();
        let mut seen = HashSet::new();

        for block in self.iter() {
            for tx in block?.transactions {
                if !seen.insert(tx.id) {
                    return Err(LedgerError::DuplicateTransaction(tx.id));
                }
                spent.extend(tx.inputs.iter().filter_map(OutPoint::from_input));

                for (vout, output) in tx.outputs.into_iter().enumerate() {
                    let vout = u32::try_from(vout)
                        .map_err(|_| LedgerError::Decode(format!("output index {} out of range", vout)))?;
                    outputs.push(Utxo {
                        outpoint: OutPoint::new(tx.id, vout),
                        output,
                    });
                }
            }
        }

        let mut set = UtxoSet::default();
        for utxo in outputs {
            if !spent.contains(&utxo.outpoint) {
                set.push(utxo)?;
            }
        }

        log::debug!("UTXO scan at {} found {} unspent output(s)", self.tip(), set.len());
        Ok(set)
    }

    pub fn find_spendable_outputs(&self, owner: &PubKeyHash, amount: u64) -> Result<(u64, Vec<Utxo>)> {
        self.scan_utxo()?.select(owner, amount)
    }

    pub fn balance(&self, owner: &PubKeyHash) -> Result<u64> {
        self.scan_utxo()?.balance(owner)
    }

    /// Search the chain for a transaction by id
    pub fn find_transaction(&self, id: &Hash256) -> Result<Option<Transaction>> {
        for block in self.iter() {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| tx.id == *id) {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }
}

impl TxResolver for ChainView<'_> {
    fn resolve(&self, txid: &Hash256) -> Result<Transaction> {
        self.find_transaction(txid)?
            .ok_or(LedgerError::ReferencedTxNotFound(*txid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::tests::{chain_paying, test_config};
    use crate::consensus::ProofOfWork;
    use crate::storage::BlockchainDB;
    use crate::wallet::KeyPair;

    fn spend(owner: &KeyPair, source: &Transaction, vout: i32, outputs: Vec<TxOutput>) -> Transaction {
        let mut tx = Transaction::new(
            vec![TxInput::new(source.id, vout, owner.pubkey_bytes())],
            outputs,
        );
        let mut known = HashMap::new();
        known.insert(source.id, source.clone());
        tx.sign(&owner.secret_key, &known).unwrap();
        tx
    }

    #[test]
    fn test_genesis_output_is_unspent() {
        let owner = KeyPair::generate();
        let chain = chain_paying(&owner, 100);

        let set = chain.scan_utxo().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.balance(&owner.pubkey_hash()).unwrap(), 100);

        let grouped = set.by_transaction();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.values().next().unwrap(), &vec![0]);
    }

    #[test]
    fn test_spent_output_disappears() {
        let owner = KeyPair::generate();
        let other = KeyPair::generate();
        let chain = chain_paying(&owner, 100);
        let source = chain.iter().next().unwrap().unwrap().transactions[0].clone();

        let tx = spend(&owner, &source, 0, vec![
            TxOutput::new(30, other.pubkey_hash()),
            TxOutput::new(70, owner.pubkey_hash()),
        ]);
        chain.append(vec![tx.clone()]).unwrap();

        let set = chain.scan_utxo().unwrap();
        assert!(!set.contains(&OutPoint::new(source.id, 0)));
        assert!(set.contains(&OutPoint::new(tx.id, 0)));
        assert!(set.contains(&OutPoint::new(tx.id, 1)));
        assert_eq!(set.balance(&owner.pubkey_hash()).unwrap(), 70);
        assert_eq!(set.balance(&other.pubkey_hash()).unwrap(), 30);
    }

    #[test]
    fn test_same_block_spend_is_excluded() {
        let owner = KeyPair::generate();
        let db = BlockchainDB::memory().unwrap();
        let pow = ProofOfWork::new(test_config().difficulty_bits).unwrap();

        let coinbase = Transaction::coinbase(owner.pubkey_hash(), "same block", 50);
        let child = spend(&owner, &coinbase, 0, vec![TxOutput::new(50, PubKeyHash::new([5; 20]))]);

        // Spender listed before the output it spends
        let block = pow.mine_block(vec![coinbase.clone(), child.clone()], Hash256::zero()).unwrap();
        db.commit_block(&block).unwrap();

        let set = ChainView::new(&db, block.hash).scan_utxo().unwrap();
        assert_eq!(set.len(), 1);
        assert!(!set.contains(&OutPoint::new(coinbase.id, 0)));
        assert!(set.contains(&OutPoint::new(child.id, 0)));
    }

    #[test]
    fn test_scan_order_newest_first() {
        let owner = KeyPair::generate();
        let chain = chain_paying(&owner, 100);
        let genesis_tx = chain.iter().next().unwrap().unwrap().transactions[0].clone();

        let reward = Transaction::coinbase(owner.pubkey_hash(), "reward", 5);
        chain.append(vec![reward.clone()]).unwrap();

        let order: Vec<Hash256> = chain.scan_utxo().unwrap().iter().map(|u| u.outpoint.txid).collect();
        assert_eq!(order, vec![reward.id, genesis_tx.id]);
    }

    #[test]
    fn test_scan_is_repeatable() {
        let owner = KeyPair::generate();
        let chain = chain_paying(&owner, 100);
        let reward = Transaction::coinbase(owner.pubkey_hash(), "again", 5);
        chain.append(vec![reward]).unwrap();

        assert_eq!(chain.scan_utxo().unwrap(), chain.scan_utxo().unwrap());
    }

    #[test]
    fn test_select_stops_when_covered() {
        let owner = KeyPair::generate();
        let chain = chain_paying(&owner, 100);
        for i in 0..3 {
            let reward = Transaction::coinbase(owner.pubkey_hash(), &format!("r{}", i), 10);
            chain.append(vec![reward]).unwrap();
        }

        // Newest rewards come first
        let (total, picked) = chain.find_spendable_outputs(&owner.pubkey_hash(), 15).unwrap();
        assert_eq!(total, 20);
        assert_eq!(picked.len(), 2);

        let (total, picked) = chain.find_spendable_outputs(&owner.pubkey_hash(), 10).unwrap();
        assert_eq!(total, 10);
        assert_eq!(picked.len(), 1);

        let (total, picked) = chain.find_spendable_outputs(&owner.pubkey_hash(), 500).unwrap();
        assert_eq!(total, 130);
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn test_select_for_stranger_is_empty() {
        let owner = KeyPair::generate();
        let stranger = KeyPair::generate();
        let chain = chain_paying(&owner, 100);

        assert_eq!(chain.balance(&stranger.pubkey_hash()).unwrap(), 0);
        let (total, picked) = chain.find_spendable_outputs(&stranger.pubkey_hash(), 1).unwrap();
        assert_eq!(total, 0);
        assert!(picked.is_empty());
    }

    #[test]
    fn test_resolver_reports_missing_transaction() {
        let owner = KeyPair::generate();
        let chain = chain_paying(&owner, 100);
        let missing = Hash256::new([8; 32]);

        assert!(matches!(
            chain.view().resolve(&missing),
            Err(LedgerError::ReferencedTxNotFound(id)) if id == missing
        ));
        assert_eq!(chain.find_transaction(&missing).unwrap(), None);
    }

    #[test]
    fn test_push_refuses_duplicate_outpoint() {
        let utxo = Utxo {
            outpoint: OutPoint::new(Hash256::new([4; 32]), 0),
            output: TxOutput::new(10, PubKeyHash::new([1; 20])),
        };
        let mut set = UtxoSet::default();
        set.push(utxo.clone()).unwrap();

        assert!(matches!(set.push(utxo), Err(LedgerError::DuplicateTransaction(_))));
        assert_eq!(set.len(), 1);
        assert_eq!(set.balance(&PubKeyHash::new([1; 20])).unwrap(), 10);
    }

    #[test]
    fn test_repeated_transaction_in_store_is_error() {
        let owner = KeyPair::generate();
        let db = BlockchainDB::memory().unwrap();
        let pow = ProofOfWork::new(test_config().difficulty_bits).unwrap();

        // Same coinbase committed twice, bypassing append
        let coinbase = Transaction::coinbase(owner.pubkey_hash(), "twice", 10);
        let first = pow.mine_block(vec![coinbase.clone()], Hash256::zero()).unwrap();
        db.commit_block(&first).unwrap();
        let second = pow.mine_block(vec![coinbase.clone()], first.hash).unwrap();
        db.commit_block(&second).unwrap();

        let view = ChainView::new(&db, second.hash);
        assert!(matches!(
            view.scan_utxo(),
            Err(LedgerError::DuplicateTransaction(id)) if id == coinbase.id
        ));
        assert!(view.balance(&owner.pubkey_hash()).is_err());
    }

    #[test]
    fn test_balance_overflow_is_error() {
        let owner = KeyPair::generate();
        let chain = chain_paying(&owner, 100);
        let huge = Transaction::coinbase(owner.pubkey_hash(), "huge", u64::MAX);
        chain.append(vec![huge]).unwrap();

        assert!(matches!(chain.balance(&owner.pubkey_hash()), Err(LedgerError::ValueOverflow)));
    }

    #[test]
    fn test_select_overflow_is_error() {
        let owner = KeyPair::generate();
        let chain = chain_paying(&owner, 100);
        let huge = Transaction::coinbase(owner.pubkey_hash(), "huge", u64::MAX - 1);
        chain.append(vec![huge]).unwrap();

        // Newest output covers a smaller amount on its own
        let (total, picked) = chain.find_spendable_outputs(&owner.pubkey_hash(), 1_000).unwrap();
        assert_eq!(total, u64::MAX - 1);
        assert_eq!(picked.len(), 1);

        assert!(matches!(
            chain.find_spendable_outputs(&owner.pubkey_hash(), u64::MAX),
            Err(LedgerError::ValueOverflow)
        ));
    }
}
