use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use warden_auth::{Action, Permission, Principal, Resource, TokenIssuer, authorize, tokens_match};
use warden_core::{PermissionId, RoleId, UserId};

fn principal() -> Principal {
    Principal::new(UserId::new(42).unwrap(), "bench-user", RoleId::new(2).unwrap())
}

fn permission_set(size: usize) -> Vec<Permission> {
    let mut out = Vec::with_capacity(size);
    let mut id = 1;
    'outer: for resource in Resource::ALL {
        for action in Action::ALL {
            if out.len() == size {
                break 'outer;
            }
            out.push(Permission {
                id: PermissionId::new(id).unwrap(),
                resource,
                action,
                description: None,
            });
            id += 1;
        }
    }
    out
}

fn bench_tokens(c: &mut Criterion) {
    let issuer = TokenIssuer::new(b"bench-access", b"bench-refresh");
    let principal = principal();
    let pair = issuer.issue_pair(&principal).unwrap();

    let mut group = c.benchmark_group("tokens");
    group.bench_function("issue_pair", |b| {
        b.iter(|| issuer.issue_pair(black_box(&principal)).unwrap())
    });
    group.bench_function("verify_access", |b| {
        b.iter(|| issuer.verify_access(black_box(&pair.access_token)).unwrap())
    });
    group.bench_function("verify_refresh", |b| {
        b.iter(|| issuer.verify_refresh(black_box(&pair.refresh_token)).unwrap())
    });
    group.finish();
}

fn bench_authorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("authorize");
    for size in [1usize, 10, 35] {
        let permissions = permission_set(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &permissions, |b, perms| {
            b.iter(|| authorize(black_box(perms), Resource::Role, Action::Delete))
        });
    }
    group.finish();
}

fn bench_csrf_compare(c: &mut Criterion) {
    let a = warden_auth::generate_csrf_token();
    let b = a.clone();
    c.bench_function("csrf/tokens_match", |bench| {
        bench.iter(|| tokens_match(black_box(&a), black_box(&b)))
    });
}

criterion_group!(benches, bench_tokens, bench_authorize, bench_csrf_compare);
criterion_main!(benches);
