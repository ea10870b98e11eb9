use std::fs::File;
use std::io::{self, BufRead, BufReader};

#[derive(Debug, Clone)]
pub struct Tile {
    passable: bool,
    vertex: Option<usize>, // id assigned in row-major order over passable tiles
}

impl Tile {
    pub fn is_passable(&self) -> bool {
        self.passable
    }
}

#[derive(Debug, Clone)]
pub struct Map {
    pub height: usize,
    pub width: usize,
    pub grid: Vec<Vec<Tile>>,
    coords: Vec<(usize, usize)>, // vertex id -> (x, y)
}

impl Map {
    pub fn from_file(path: &str) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut lines = reader.lines();

        let _type = lines.next().unwrap()?;
        let height = lines
            .next()
            .unwrap()?
            .split_whitespace()
            .last()
            .unwrap()
            .parse::<usize>()
            .unwrap();
        let width = lines
            .next()
            .unwrap()?
            .split_whitespace()
            .last()
            .unwrap()
            .parse::<usize>()
            .unwrap();
        let _map = lines.next().unwrap()?;

        let mut grid = Vec::with_capacity(height);
        let mut coords = Vec::new();
        for (x, line) in lines.take(height).enumerate() {
            let row: Vec<char> = line?.chars().collect();
            let tiles_row: Vec<Tile> = row
                .into_iter()
                .enumerate()
                .map(|(y, ch)| {
                    let passable = ch == '.';
                    let vertex = if passable {
                        coords.push((x, y));
                        Some(coords.len() - 1)
                    } else {
                        None
                    };
                    Tile { passable, vertex }
                })
                .collect();
            grid.push(tiles_row);
        }

        Ok(Map {
            height,
            width,
            grid,
            coords,
        })
    }

    pub fn is_passable(&self, x: usize, y: usize) -> bool {
        self.grid[x][y].is_passable()
    }

    pub fn vertex_at(&self, x: usize, y: usize) -> Option<usize> {
        self.grid.get(x)?.get(y)?.vertex
    }

    pub fn coord_of(&self, vertex: usize) -> (usize, usize) {
        self.coords[vertex]
    }

    pub fn num_vertices(&self) -> usize {
        self.coords.len()
    }

    pub fn get_neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let directions = [(-1, 0), (1, 0), (0, -1), (0, 1)]; // Up, down, left, right
        let mut neighbors = Vec::new();

        for &(dx, dy) in &directions {
            let new_x = x as i32 + dx;
            let new_y = y as i32 + dy;
            if new_x >= 0
                && new_y >= 0
                && new_x < self.height as i32
                && new_y < self.width as i32
                && self.grid[new_x as usize][new_y as usize].passable
            {
                neighbors.push((new_x as usize, new_y as usize));
            }
        }

        neighbors
    }

    pub fn to_graph(&self) -> Graph {
        let mut adj = vec![Vec::new(); self.coords.len()];
        for (id, &(x, y)) in self.coords.iter().enumerate() {
            for (nx, ny) in self.get_neighbors(x, y) {
                if let Some(n_id) = self.grid[nx][ny].vertex {
                    adj[id].push(n_id);
                }
            }
        }
        Graph::new(adj)
    }
}

/// Undirected graph over stable integer vertex ids. Adjacency lists keep
/// their construction order, which fixes the candidate order the planners
/// fall back to when no RNG is supplied.
#[derive(Debug, Clone)]
pub struct Graph {
    adj: Vec<Vec<usize>>,
}

impl Graph {
    pub fn new(adj: Vec<Vec<usize>>) -> Self {
        Graph { adj }
    }

    pub fn num_vertices(&self) -> usize {
        self.adj.len()
    }

    pub fn neighbors(&self, v: usize) -> &[usize] {
        &self.adj[v]
    }

    pub fn degree(&self, v: usize) -> usize {
        self.adj[v].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TEST_MAP: &str = "\
type octile
height 3
width 4
map
.@..
..@.
@...
";

    #[test]
    fn test_read_map() {
        let map = Map::from_reader(Cursor::new(TEST_MAP)).unwrap();

        assert_eq!(map.height, 3);
        assert_eq!(map.width, 4);

        assert!(map.is_passable(0, 0));
        assert!(!map.is_passable(0, 1));
        assert!(!map.is_passable(1, 2));
        assert!(map.is_passable(2, 3));

        // 9 passable tiles, ids assigned row-major
        assert_eq!(map.num_vertices(), 9);
        assert_eq!(map.vertex_at(0, 0), Some(0));
        assert_eq!(map.vertex_at(0, 2), Some(1));
        assert_eq!(map.vertex_at(1, 0), Some(3));
        assert_eq!(map.vertex_at(0, 1), None);
        assert_eq!(map.coord_of(2), (0, 3));

        let neighbors = map.get_neighbors(1, 1);
        assert_eq!(neighbors.len(), 2);
        assert!(neighbors.contains(&(2, 1)));
        assert!(neighbors.contains(&(1, 0)));
    }

    #[test]
    fn test_to_graph() {
        let map = Map::from_reader(Cursor::new(TEST_MAP)).unwrap();
        let graph = map.to_graph();

        assert_eq!(graph.num_vertices(), 9);

        // (0, 0) touches only (1, 0)
        let v = map.vertex_at(0, 0).unwrap();
        let u = map.vertex_at(1, 0).unwrap();
        assert_eq!(graph.neighbors(v), &[u]);

        // adjacency is symmetric
        assert!(graph.neighbors(u).contains(&v));

        // (1, 1) touches (2, 1) and (1, 0) only, (0, 1) is a wall
        let w = map.vertex_at(1, 1).unwrap();
        assert_eq!(graph.degree(w), 2);
    }
}
