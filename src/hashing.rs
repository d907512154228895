use xxhash_rust::xxh64::xxh64;

/// キー付きハッシャー
///
/// シード文字列から64ビットシードを導出し、そのシードでxxHash64を適用する。
/// 同じシード文字列に対してプロセスをまたいで決定的な値を返す。
pub struct KeyedHasher {
    /// 導出済みの64ビットシード
    seed: u64,
}

impl KeyedHasher {
    /// シード文字列からハッシャーを作成
    ///
    /// シード文字列自体をシード0のxxHash64でハッシュ化し、64ビットシードとする。
    pub fn new(seed_str: &str) -> Self {
        let seed = xxh64(seed_str.as_bytes(), 0);
        tracing::debug!("KeyedHasher initialized (seed_str={}, seed={:#x})", seed_str, seed);
        Self { seed }
    }

    /// 入力バイト列をハッシュ化
    pub fn hash(&self, input: &[u8]) -> u64 {
        xxh64(input, self.seed)
    }

    /// 導出済みシードを取得
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
