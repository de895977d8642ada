use rusqlite::{Connection, params};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn main() {
    let mut rng = SimpleRng::new(42);

    // (common name, scientific name, PIF watchlist, regional stewardship)
    let species: [(&str, &str, i64, i64); 8] = [
        ("Wood Thrush", "Hylocichla mustelina", 1, 1),
        ("Ovenbird", "Seiurus aurocapilla", 0, 1),
        ("Acadian Flycatcher", "Empidonax virescens", 0, 0),
        ("Scarlet Tanager", "Piranga olivacea", 0, 1),
        ("Eastern Towhee", "Pipilo erythrophthalmus", 0, 0),
        ("Kentucky Warbler", "Geothlypis formosa", 1, 0),
        ("Indigo Bunting", "Passerina cyanea", 0, 0),
        ("Red-eyed Vireo", "Vireo olivaceus", 0, 0),
    ];
    let months = ["April", "May", "June", "July"];
    let locations = ["Forest", "Grassland"];
    let observers = ["E. Oberg", "M. Petersen", "B. Swimley"];
    let admin_units = ["ANTI", "CATO", "CHOH", "HAFE"];
    let plots = [
        "ANTI-0054",
        "CATO-0123",
        "CHOH-0316",
        "HAFE-0036",
        "ANTI-0089",
    ];
    let sexes = ["Male", "Male", "Female", "Undetermined"];
    let id_methods = ["Singing", "Calling", "Visualization"];
    let skies = ["Clear or Few Clouds", "Partly Cloudy", "Cloudy/Overcast"];
    let winds = [
        "Calm (<1 mph)",
        "Light Air Movement (1-3 mph)",
        "Light Breeze (4-7 mph)",
    ];
    let disturbances = [
        "No effect on count",
        "Slight effect on count",
        "Moderate effect on count",
    ];
    let intervals = ["0-2.5 min", "2.5-5 min", "5-7.5 min", "7.5-10 min"];

    let output_path = "sample_species.db";
    let _ = std::fs::remove_file(output_path);
    let conn = Connection::open(output_path).expect("Failed to create database");
    conn.execute_batch(
        "CREATE TABLE Species_analysis (
            Year INTEGER,
            MonthName TEXT,
            Common_Name TEXT,
            Scientific_Name TEXT,
            Sex TEXT,
            Location_Type TEXT,
            ID_Method TEXT,
            Observer TEXT,
            Admin_Unit_Code TEXT,
            Plot_Name TEXT,
            Temperature REAL,
            Humidity REAL,
            Sky TEXT,
            Wind TEXT,
            Disturbance TEXT,
            Visit INTEGER,
            Mid_Hour REAL,
            Distance_Mid REAL,
            Interval_Duration TEXT,
            PIF_Watchlist_Status INTEGER,
            Regional_Stewardship_Status INTEGER
        )",
    )
    .expect("Failed to create table");

    let n_rows = 600;
    let mut insert = conn
        .prepare(
            "INSERT INTO Species_analysis VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
              ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        )
        .expect("Failed to prepare insert");

    for _ in 0..n_rows {
        let &(name, scientific, pif, steward) = rng.pick(&species);
        let year = 2017 + (rng.next_u64() % 3) as i64;
        let unit = *rng.pick(&admin_units);
        insert
            .execute(params![
                year,
                *rng.pick(&months),
                name,
                scientific,
                *rng.pick(&sexes),
                *rng.pick(&locations),
                *rng.pick(&id_methods),
                *rng.pick(&observers),
                unit,
                *rng.pick(&plots),
                round1(rng.gauss(20.0, 4.0)),
                round1(rng.gauss(65.0, 12.0).clamp(20.0, 100.0)),
                *rng.pick(&skies),
                *rng.pick(&winds),
                *rng.pick(&disturbances),
                1 + (rng.next_u64() % 3) as i64,
                round1(rng.range(4.0, 11.9)),
                round1(rng.gauss(45.0, 20.0).abs()),
                *rng.pick(&intervals),
                pif,
                steward,
            ])
            .expect("Failed to insert row");
    }
    drop(insert);
    conn.close()
        .map_err(|(_, e)| e)
        .expect("Failed to close database");

    println!("Wrote {n_rows} observations to {output_path}");
}
