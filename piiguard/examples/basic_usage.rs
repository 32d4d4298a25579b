//! Basic usage example for `piiguard`.

use piiguard::heap::HeapStatements;
use piiguard::prelude::*;
use piiguard_key_file::FileKeyProvider;
use std::path::PathBuf;
use uuid::Uuid;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("piiguard Basic Usage Example");
    println!("============================\n");

    // Setup: create a key directory
    let key_dir = PathBuf::from("./example_keys");
    if !key_dir.exists() {
        println!("Initializing key directory at {}...", key_dir.display());
        FileKeyProvider::init(&key_dir)?;
        println!("✓ Key directory initialized\n");
    }

    let provider = FileKeyProvider::new(&key_dir)?;
    let config = CryptoConfig::default().with_deriver_identity(Uuid::nil());
    let crypto = FieldCrypto::new(&provider, config)?;
    println!("✓ FieldCrypto created with {}\n", crypto.config().cipher_mode);

    // Each row gets its own derived key
    let row_id = Uuid::new_v4();
    let email = "john.doe@example.com";
    println!("Row: {row_id}");
    println!("Plaintext: {email}");

    let ciphertext = crypto.seal(row_id, email.to_string())?;
    println!("✓ Encrypted: {ciphertext}");

    let decrypted: String = crypto.open(row_id, &ciphertext)?;
    assert_eq!(decrypted, email);
    println!("✓ Decrypted: {decrypted}\n");

    // Exact-match lookup without decryption
    let bidx = crypto.blind_index_value(row_id, email.to_string()).encode()?;
    println!("Blind index: {bidx}\n");

    // Substring search through the heap
    let store = MemoryHeapStore::new();
    let heap = crypto.build_heap(email, "email_text_heap")?;
    for entry in &heap.entries {
        println!("  heap token {:<10} -> {}", entry.content, entry.hash);
    }
    let inserted = crypto.save_to_heap(&store, &heap.entries)?;
    println!("✓ {inserted} heap rows saved, email_bidx = {}\n", heap.digest);

    let hashes = crypto.search_contents(&store, "email_text_heap", "doe")?;
    if let Some(predicate) = IndexPredicate::any_of("email_bidx", &hashes) {
        println!("Search 'doe': {}", predicate.apply_to("SELECT id, email FROM profiles"));
        println!("  args: {:?}", predicate.args());
        println!("  matches this row: {}", predicate.matches(&heap.digest));
    }

    let statements = HeapStatements::new("email_text_heap")?;
    println!("\nHeap SQL for a database-backed store:");
    println!("  {}", statements.insert());
    println!("  {}", statements.hash_exists());
    println!("  {}", statements.search_content());

    Ok(())
}
