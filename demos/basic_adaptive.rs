use adacache::adaptive::AdaptiveCache;

fn main() {
    // Small layout for a readable demo: 24 entries, quantum of 4, every key
    // sampled into the shadow caches.
    let mut cache = AdaptiveCache::try_with_layout(24, 4, 0).unwrap();

    // Record what the pipeline spent computing each key.
    for key in 0..24u64 {
        let latency = if key % 2 == 0 { 12.5 } else { 0.2 };
        cache.set(key, (latency, 128));
    }

    if cache.contains(2) {
        let (latency, tokens) = cache.get(2);
        println!("key 2 -> latency {latency} ms, {tokens} tokens");
    }

    // Churn past capacity, then let the cache re-tune its partition.
    for key in 24..64u64 {
        cache.set(key, (0.2, 64));
    }
    println!("window cost before adapt: {}", cache.timeframe_cost());
    cache.adapt();
    println!("{cache}");
}
