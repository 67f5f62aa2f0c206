use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gotac::lexer::Lexer;
use gotac::{compile, CompileOptions};
use std::hint::black_box as bb;

// =============================================================================
// Test Corpus - Different sizes of Go code
// =============================================================================

const SMALL_HELLO_WORLD: &str = r#"
package main

func main() {
    println("Hello, World!")
}
"#;

const MEDIUM_LOOPS: &str = r#"
package main

var total int

func sum(n int) int {
    s := 0
    for i := 0; i < n; i++ {
        k := 4 * 8
        s += i * k
    }
    return s
}

func main() {
    var x int = 5
    var y int = 10
    z := x + y
    total = sum(z)
    if total > 100 {
        total = total / 2
    } else {
        total = total * 2
    }
}
"#;

const LARGE_SORTS: &str = r#"
package main

type Pair struct {
    a int
    b float64
}

const size = 8

var data [size]int

func swap(i int, j int) {
    t := data[i]
    data[i] = data[j]
    data[j] = t
}

func bubble() {
    for i := 0; i < size; i++ {
        for j := 0; j < size-1-i; j++ {
            if data[j] > data[j+1] {
                swap(j, j+1)
            }
        }
    }
}

func partition(lo, hi int) int {
    pivot := data[hi]
    i := lo - 1
    for j := lo; j < hi; j++ {
        if data[j] <= pivot {
            i++
            swap(i, j)
        }
    }
    swap(i+1, hi)
    return i + 1
}

func quick(lo, hi int) {
    if lo < hi {
        p := partition(lo, hi)
        quick(lo, p-1)
        quick(p+1, hi)
    }
}

func search(x int) int {
    lo, hi := 0, size-1
    for lo <= hi {
        mid := (lo + hi) / 2
        if data[mid] == x {
            return mid
        } else if data[mid] < x {
            lo = mid + 1
        } else {
            hi = mid - 1
        }
    }
    return -1
}

func main() {
    p := Pair{1, 2.5}
    p.a = p.a * 16
    for i, v := range data {
        data[i] = v + i*3
    }
    bubble()
    quick(0, size-1)
    println(search(p.a))
}
"#;

fn corpora() -> [(&'static str, &'static str); 3] {
    [
        ("small", SMALL_HELLO_WORLD),
        ("medium", MEDIUM_LOOPS),
        ("large", LARGE_SORTS),
    ]
}

// =============================================================================
// Benchmark 1: Lexer (semicolon insertion included)
// =============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");

    for (name, input) in corpora() {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("iterate_only_bytes", name), &input, |b, &input| {
            b.iter(|| {
                let mut acc: u64 = 0;
                for tok in Lexer::new(bb(input)) {
                    acc = acc.wrapping_add(tok.span.start as u64);
                    acc = acc.wrapping_add(tok.span.end as u64);
                }
                bb(acc);
            });
        });
    }

    group.finish();
}

// =============================================================================
// Benchmark 2: Full pipeline
// - front_end: parse + check + generate
// - optimized: the same plus every optimization pass
// =============================================================================

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let plain = CompileOptions::unoptimized();
    let full = CompileOptions::default();

    for (name, input) in corpora() {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::new("front_end", name), &input, |b, &input| {
            b.iter(|| {
                let out = compile(bb(input), &plain);
                bb(out.raw_ic.len());
            });
        });
        group.bench_with_input(BenchmarkId::new("optimized", name), &input, |b, &input| {
            b.iter(|| {
                let out = compile(bb(input), &full);
                bb(out.ic.len());
            });
        });
    }

    group.finish();
}

// =============================================================================
// Benchmark 3: Scalability in straight-line statements
// =============================================================================

fn make_straight_line(n: usize) -> String {
    let mut src = String::from("package main\n\nfunc main() {\n    x := 1\n");
    for i in 0..n {
        src.push_str(&format!("    x = x*2 + {i}\n"));
    }
    src.push_str("    println(x)\n}\n");
    src
}

fn bench_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability");

    for n in [100usize, 1_000, 5_000] {
        let src = make_straight_line(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("optimized", n), &src, |b, src| {
            b.iter(|| bb(compile(bb(src), &CompileOptions::default()).ic.len()));
        });
    }

    group.finish();
}

// =============================================================================
// Criterion registration
// =============================================================================

criterion_group!(benches, bench_lexer, bench_compile, bench_scalability);
criterion_main!(benches);
