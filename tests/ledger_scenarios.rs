// End-to-end ledger scenarios

use pow_ledger::{
    Block, Blockchain, BlockchainDB, ChainConfig, Hash256, KeyPair, LedgerError, Transaction,
    TransactionBuilder, TxInput, TxOutput,
};
use tempfile::TempDir;

fn test_config() -> ChainConfig {
    ChainConfig {
        temporary: true,
        difficulty_bits: 8,
        ..ChainConfig::default()
    }
}

fn new_chain(owner: &KeyPair) -> Blockchain {
    let coinbase = Transaction::coinbase(owner.pubkey_hash(), "First Transaction from Genesis", 100);
    Blockchain::init(test_config(), coinbase).unwrap()
}

fn genesis_tx(chain: &Blockchain) -> Transaction {
    chain.iter().last().unwrap().unwrap().transactions[0].clone()
}

#[test]
fn test_send_updates_balances() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let chain = new_chain(&alice);
    let builder = TransactionBuilder::new(&chain);

    assert_eq!(chain.balance(&alice.pubkey_hash()).unwrap(), 100);
    assert_eq!(chain.balance(&bob.pubkey_hash()).unwrap(), 0);

    let tx = builder.build(&alice, &bob.pubkey_hash(), 30).unwrap();
    chain.append(vec![tx]).unwrap();

    assert_eq!(chain.balance(&alice.pubkey_hash()).unwrap(), 70);
    assert_eq!(chain.balance(&bob.pubkey_hash()).unwrap(), 30);

    // Bob spends his received output back
    let tx = builder.build(&bob, &alice.pubkey_hash(), 10).unwrap();
    chain.append(vec![tx]).unwrap();

    assert_eq!(chain.balance(&alice.pubkey_hash()).unwrap(), 80);
    assert_eq!(chain.balance(&bob.pubkey_hash()).unwrap(), 20);
    assert_eq!(chain.verify_chain().unwrap(), 3);
}

#[test]
fn test_spent_output_cannot_be_reused() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let carol = KeyPair::generate();
    let chain = new_chain(&alice);
    let source = genesis_tx(&chain);

    let first = TransactionBuilder::new(&chain)
        .build(&alice, &bob.pubkey_hash(), 100)
        .unwrap();
    chain.append(vec![first]).unwrap();
    let tip = chain.tip();

    // Hand-built spend of the already spent genesis output
    let mut replay = Transaction::new(
        vec![TxInput::new(source.id, 0, alice.pubkey_bytes())],
        vec![TxOutput::new(100, carol.pubkey_hash())],
    );
    chain.sign_transaction(&mut replay, &alice.secret_key).unwrap();

    assert!(!chain.verify_transaction(&replay).unwrap());
    assert!(matches!(
        chain.append(vec![replay]),
        Err(LedgerError::InvalidTransaction(_))
    ));
    assert_eq!(chain.tip(), tip);
    assert_eq!(chain.balance(&carol.pubkey_hash()).unwrap(), 0);
}

#[test]
fn test_wrong_key_is_rejected() {
    let alice = KeyPair::generate();
    let mallory = KeyPair::generate();
    let chain = new_chain(&alice);
    let source = genesis_tx(&chain);
    let tip = chain.tip();

    let mut theft = Transaction::new(
        vec![TxInput::new(source.id, 0, alice.pubkey_bytes())],
        vec![TxOutput::new(100, mallory.pubkey_hash())],
    );
    chain.sign_transaction(&mut theft, &mallory.secret_key).unwrap();

    let result = chain.append(vec![theft.clone()]);
    assert!(matches!(result, Err(LedgerError::InvalidTransaction(id)) if id == theft.id));
    assert_eq!(chain.tip(), tip);
    assert_eq!(chain.balance(&alice.pubkey_hash()).unwrap(), 100);
}

#[test]
fn test_insufficient_funds() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let chain = new_chain(&alice);

    let result = TransactionBuilder::new(&chain).build(&alice, &bob.pubkey_hash(), 150);
    assert!(matches!(
        result,
        Err(LedgerError::InsufficientFunds { required: 150, available: 100 })
    ));
}

#[test]
fn test_iteration_yields_every_block_newest_first() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let chain = new_chain(&alice);
    let builder = TransactionBuilder::new(&chain);

    let mut hashes = vec![chain.tip()];
    for _ in 0..3 {
        let tx = builder.build(&alice, &bob.pubkey_hash(), 5).unwrap();
        hashes.push(chain.append(vec![tx]).unwrap().hash);
    }
    hashes.reverse();

    let blocks: Vec<Block> = chain.iter().collect::<Result<_, _>>().unwrap();
    let seen: Vec<Hash256> = blocks.iter().map(|b| b.hash).collect();
    assert_eq!(seen, hashes);

    for block in &blocks {
        assert!(chain.pow().validate(block));
    }
    assert!(blocks.last().unwrap().is_genesis());
    assert_eq!(chain.balance(&bob.pubkey_hash()).unwrap(), 15);
}

#[test]
fn test_utxo_scan_is_stable() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let chain = new_chain(&alice);

    let tx = TransactionBuilder::new(&chain)
        .build(&alice, &bob.pubkey_hash(), 40)
        .unwrap();
    chain.append(vec![tx.clone()]).unwrap();

    let first = chain.scan_utxo().unwrap();
    let second = chain.scan_utxo().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(first.by_transaction().get(&tx.id), Some(&vec![0, 1]));
}

#[test]
fn test_reopen_shared_store() {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate();
    let db = BlockchainDB::memory().unwrap();

    let coinbase = Transaction::coinbase(alice.pubkey_hash(), "shared", 100);
    let chain = Blockchain::init_with(db.clone(), test_config(), coinbase).unwrap();
    let tx = TransactionBuilder::new(&chain)
        .build(&alice, &bob.pubkey_hash(), 60)
        .unwrap();
    chain.append(vec![tx]).unwrap();
    let tip = chain.tip();
    drop(chain);

    let reopened = Blockchain::open_with(db, test_config()).unwrap();
    assert_eq!(reopened.tip(), tip);
    assert_eq!(reopened.iter().count(), 2);
    assert_eq!(reopened.balance(&alice.pubkey_hash()).unwrap(), 40);
    assert_eq!(reopened.balance(&bob.pubkey_hash()).unwrap(), 60);
}

#[test]
fn test_on_disk_chain() {
    let dir = TempDir::new().unwrap();
    let alice = KeyPair::generate();
    let config = ChainConfig {
        difficulty_bits: 8,
        ..ChainConfig::with_data_dir(dir.path())
    };

    let bob = KeyPair::generate();
    let coinbase = Transaction::coinbase(alice.pubkey_hash(), "disk", 100);
    let chain = Blockchain::init(config.clone(), coinbase).unwrap();
    assert!(config.blocks_path().exists());

    let tx = TransactionBuilder::new(&chain)
        .build(&alice, &bob.pubkey_hash(), 25)
        .unwrap();
    chain.append(vec![tx]).unwrap();
    let tip = chain.tip();
    drop(chain);

    let reopened = Blockchain::open(config.clone()).unwrap();
    assert_eq!(reopened.tip(), tip);
    assert_eq!(reopened.verify_chain().unwrap(), 2);
    assert_eq!(reopened.balance(&alice.pubkey_hash()).unwrap(), 75);
    assert_eq!(reopened.balance(&bob.pubkey_hash()).unwrap(), 25);
    drop(reopened);

    let again = Transaction::coinbase(alice.pubkey_hash(), "disk again", 100);
    assert!(matches!(
        Blockchain::init(config, again),
        Err(LedgerError::AlreadyExists)
    ));
}

#[test]
fn test_open_without_chain() {
    let result = Blockchain::open(test_config());
    assert!(matches!(result, Err(LedgerError::NotFound)));
}
