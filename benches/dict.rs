use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::distributions::{Distribution, Standard};
use rand::{Rng, SeedableRng};
use splitter_types::cell::*;
use splitter_types::dict::*;

fn random_entries<K, V>(num_elements: usize) -> BTreeMap<K, V>
where
    Standard: Distribution<K> + Distribution<V>,
    K: Ord,
{
    let mut rng = rand_xorshift::XorShiftRng::from_seed([0u8; 16]);
    (0..num_elements)
        .map(|_| (rng.gen::<K>(), rng.gen::<V>()))
        .collect()
}

fn build_dict_impl<K, V>(id: BenchmarkId, num_elements: usize, c: &mut Criterion)
where
    Standard: Distribution<K> + Distribution<V>,
    K: Store + DictKey + Ord,
    V: Store,
{
    let entries = random_entries::<K, V>(num_elements);

    c.bench_with_input(id, &entries, |b, entries| {
        b.iter(|| {
            let result = Dict::<K, V>::try_from_btree(entries).unwrap();
            black_box(result);
        });
    });
}

fn iter_dict_impl<K, V>(id: BenchmarkId, num_elements: usize, c: &mut Criterion)
where
    Standard: Distribution<K> + Distribution<V>,
    K: Store + DictKey + Ord,
    V: Store + for<'a> Load<'a>,
{
    let entries = random_entries::<K, V>(num_elements);
    let dict = Dict::<K, V>::try_from_btree(&entries).unwrap();

    c.bench_with_input(id, &dict, |b, dict| {
        b.iter(|| {
            for entry in dict.iter() {
                black_box(entry.unwrap());
            }
        });
    });
}

fn dict_group(c: &mut Criterion) {
    macro_rules! decl_dict_benches {
        ($({ $n:literal, $k:ty, $v:ident }),*$(,)?) => {
            $({
                let id = BenchmarkId::new(
                    "build_dict",
                    format!(
                        "size={}; key={}; value={}",
                        $n, stringify!($k), stringify!($v)
                    )
                );
                build_dict_impl::<$k, $v>(id, $n, c);
            });*

            $({
                let id = BenchmarkId::new(
                    "iter_dict",
                    format!(
                        "size={}; key={}; value={}",
                        $n, stringify!($k), stringify!($v)
                    )
                );
                iter_dict_impl::<$k, $v>(id, $n, c);
            });*
        };
    }

    decl_dict_benches![
        { 10, u8, u64 },
        { 256, u8, u64 },

        { 10, u32, u64 },
        { 1000, u32, u64 },

        { 10, u64, u64 },
        { 1000, u64, u64 },
        { 10000, u64, u64 },
    ];
}

criterion_group!(dict, dict_group);
criterion_main!(dict);
