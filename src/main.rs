use skipmem::{BPlusTree, MemTable, SkipList};

fn main() -> skipmem::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let mut map = SkipList::new();
    map.insert(vec![7, 5, 5], vec![3, 3, 3])?;
    map.insert(vec![1, 2, 3], vec![1, 2, 3])?;
    map.insert(vec![5, 5, 5], vec![5, 5, 5])?;
    map.insert(vec![0, 5, 5], vec![5, 5, 5])?;
    map.insert(vec![0, 0, 5], vec![5, 5, 5])?;
    map.insert(vec![0, 0, 1], vec![5, 5, 5])?;
    map.dbg_print();
    map.erase(vec![5, 5, 5].as_slice());
    map.dbg_print();

    let mut table = MemTable::new();
    table.put(1, "apple", "red")?;
    table.put(2, "banana", "yellow")?;
    table.delete(3, "apple")?;
    for (key, entry) in table.iter() {
        println!("{:?} seq={} {:?}", key, entry.seq(), entry.value_type());
    }

    let mut tree = BPlusTree::with_order(3);
    for k in [8, 2, 15, 5, 11, 1, 13, 3, 6, 9] {
        tree.set(k, k * k);
    }
    tree.dbg_print();
    Ok(())
}
